//! Cart rows and the joined cart lines the reconciler exposes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use community_mart_core::{CartItemId, Price, ProductId, ProfileId};

use super::catalog::ProductSnapshot;

/// A raw `cart_items` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRow {
    pub id: CartItemId,
    pub user_id: ProfileId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub id: CartItemId,
    pub user_id: ProfileId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub snapshot: ProductSnapshot,
}

impl CartLine {
    /// Join a row with the snapshot of its product.
    #[must_use]
    pub fn new(row: CartItemRow, snapshot: ProductSnapshot) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            snapshot,
        }
    }

    /// Effective unit price on `date`.
    #[must_use]
    pub fn unit_price(&self, date: NaiveDate) -> Price {
        self.snapshot.effective_price(date)
    }

    /// `unit_price(date) × quantity`.
    #[must_use]
    pub fn subtotal(&self, date: NaiveDate) -> Price {
        self.unit_price(date).times(self.quantity)
    }
}
