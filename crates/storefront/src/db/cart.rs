//! Cart repository: `cart_items` rows and their product snapshots.

use chrono::NaiveDate;
use serde_json::json;
use tracing::instrument;

use community_mart_core::{CartItemId, ProductId, ProfileId};

use super::{CatalogRepository, distinct};
use crate::models::{CartItemRow, CartLine};
use crate::store::{BackendError, DataStore, Query, decode_row, decode_rows, tables};

/// Repository for `cart_items` rows.
pub struct CartRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// A user's cart rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn rows(&self, user_id: ProfileId) -> Result<Vec<CartItemRow>, BackendError> {
        let query = Query::new()
            .eq("user_id", user_id)
            .order_desc("created_at");
        let rows = self.store.select(tables::CART_ITEMS, &query).await?;
        decode_rows(tables::CART_ITEMS, rows)
    }

    /// A user's cart, newest first, each row joined with its product,
    /// category, and the promotion active on `date`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::UnexpectedShape` if a row references a product
    /// that no longer exists, or another `BackendError` if a query fails.
    #[instrument(skip(self))]
    pub async fn lines(
        &self,
        user_id: ProfileId,
        date: NaiveDate,
    ) -> Result<Vec<CartLine>, BackendError> {
        let rows = self.rows(user_id).await?;
        let product_ids = distinct(&rows, |row| row.product_id);
        let snapshots = CatalogRepository::new(self.store)
            .snapshots(&product_ids, date)
            .await?;

        rows.into_iter()
            .map(|row| {
                // Two lines for one product (see `find`) share a snapshot
                let snapshot = snapshots.get(&row.product_id).cloned().ok_or_else(|| {
                    BackendError::UnexpectedShape(format!(
                        "cart item {} references missing product {}",
                        row.id, row.product_id
                    ))
                })?;
                Ok(CartLine::new(row, snapshot))
            })
            .collect()
    }

    /// The user's line for `product_id`, if any.
    ///
    /// Nothing stops two sessions from both inserting a line for the same
    /// product; if that happened the oldest line is returned.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or the row is malformed.
    #[instrument(skip(self))]
    pub async fn find(
        &self,
        user_id: ProfileId,
        product_id: ProductId,
    ) -> Result<Option<CartItemRow>, BackendError> {
        let query = Query::new()
            .eq("user_id", user_id)
            .eq("product_id", product_id)
            .order_asc("created_at")
            .limit(1);
        let rows = self.store.select(tables::CART_ITEMS, &query).await?;

        rows.into_iter()
            .next()
            .map(|row| decode_row(tables::CART_ITEMS, row))
            .transpose()
    }

    /// Insert a new line.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the insert fails.
    #[instrument(skip(self))]
    pub async fn insert(
        &self,
        user_id: ProfileId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartItemRow, BackendError> {
        let row = json!({
            "id": CartItemId::generate(),
            "user_id": user_id,
            "product_id": product_id,
            "quantity": quantity,
        });
        let inserted = self.store.insert(tables::CART_ITEMS, row).await?;
        decode_row(tables::CART_ITEMS, inserted)
    }

    /// Overwrite a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the line does not exist.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        id: CartItemId,
        quantity: i32,
    ) -> Result<CartItemRow, BackendError> {
        let updated = self
            .store
            .update(tables::CART_ITEMS, id.as_uuid(), json!({ "quantity": quantity }))
            .await?;
        decode_row(tables::CART_ITEMS, updated)
    }

    /// Delete a line. Deleting a missing line succeeds.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: CartItemId) -> Result<(), BackendError> {
        self.store.delete(tables::CART_ITEMS, id.as_uuid()).await
    }
}
