//! User identity (`profiles` table).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use community_mart_core::{Phone, ProfileId};

/// A resolved user identity.
///
/// Created on first login and only ever mutated to change the display name.
/// Also the value persisted in the session cache, so it round-trips through
/// serde; a cached entry whose phone no longer validates fails to parse and
/// is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: ProfileId,
    /// Unique natural key.
    pub phone: Phone,
    /// Display name.
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    /// Display name, e.g. for greetings.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.full_name
    }
}
