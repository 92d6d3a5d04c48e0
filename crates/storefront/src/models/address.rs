//! Shipping addresses (`addresses` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use community_mart_core::{AddressId, ProfileId};

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub user_id: ProfileId,
    pub recipient_name: String,
    /// Contact number of the recipient. Not validated: it may belong to
    /// someone other than the account holder.
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail_address: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// Single-line rendering: province, city, district, then street detail.
    #[must_use]
    pub fn full_address(&self) -> String {
        format!(
            "{}{}{} {}",
            self.province, self.city, self.district, self.detail_address
        )
    }
}

/// Fields for a new address, as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddress {
    pub recipient_name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail_address: String,
    #[serde(default)]
    pub is_default: bool,
}

impl NewAddress {
    /// Name of the first blank required field, if any.
    #[must_use]
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("recipient_name", &self.recipient_name),
            ("phone", &self.phone),
            ("province", &self.province),
            ("city", &self.city),
            ("district", &self.district),
            ("detail_address", &self.detail_address),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}
