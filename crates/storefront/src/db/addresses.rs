//! Address repository.

use serde_json::json;
use tracing::instrument;

use community_mart_core::{AddressId, ProfileId};

use crate::models::{Address, NewAddress};
use crate::store::{BackendError, DataStore, Query, decode_row, decode_rows, tables};

/// Repository for `addresses` rows.
pub struct AddressRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> AddressRepository<'a> {
    /// Create a new address repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// A user's addresses: the default first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn list(&self, user_id: ProfileId) -> Result<Vec<Address>, BackendError> {
        let query = Query::new()
            .eq("user_id", user_id)
            .order_desc("is_default")
            .order_desc("created_at");
        let rows = self.store.select(tables::ADDRESSES, &query).await?;
        decode_rows(tables::ADDRESSES, rows)
    }

    /// One of the user's addresses, if it exists and belongs to them.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or the row is malformed.
    #[instrument(skip(self))]
    pub async fn get(
        &self,
        user_id: ProfileId,
        id: AddressId,
    ) -> Result<Option<Address>, BackendError> {
        let query = Query::new().eq("id", id).eq("user_id", user_id).limit(1);
        let rows = self.store.select(tables::ADDRESSES, &query).await?;

        rows.into_iter()
            .next()
            .map(|row| decode_row(tables::ADDRESSES, row))
            .transpose()
    }

    /// Addresses with the given IDs, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    pub async fn by_ids(&self, ids: &[AddressId]) -> Result<Vec<Address>, BackendError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .select(tables::ADDRESSES, &Query::new().is_in("id", ids))
            .await?;
        decode_rows(tables::ADDRESSES, rows)
    }

    /// Save a new address. If it is marked default, the user's other
    /// addresses stop being default first.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if a write fails.
    #[instrument(skip(self, address))]
    pub async fn create(
        &self,
        user_id: ProfileId,
        address: &NewAddress,
    ) -> Result<Address, BackendError> {
        if address.is_default {
            self.clear_default(user_id).await?;
        }

        let row = json!({
            "id": AddressId::generate(),
            "user_id": user_id,
            "recipient_name": address.recipient_name,
            "phone": address.phone,
            "province": address.province,
            "city": address.city,
            "district": address.district,
            "detail_address": address.detail_address,
            "is_default": address.is_default,
        });
        let inserted = self.store.insert(tables::ADDRESSES, row).await?;
        decode_row(tables::ADDRESSES, inserted)
    }

    /// Make `id` the user's only default address.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the address does not exist or
    /// belongs to someone else, or another `BackendError` if a write fails.
    #[instrument(skip(self))]
    pub async fn set_default(
        &self,
        user_id: ProfileId,
        id: AddressId,
    ) -> Result<Address, BackendError> {
        if self.get(user_id, id).await?.is_none() {
            return Err(BackendError::NotFound(format!("address {id}")));
        }

        self.clear_default(user_id).await?;
        let updated = self
            .store
            .update(tables::ADDRESSES, id.as_uuid(), json!({ "is_default": true }))
            .await?;
        decode_row(tables::ADDRESSES, updated)
    }

    /// Delete one of the user's addresses.
    ///
    /// Orders that shipped to it keep their `address_id`; their address is
    /// reported as missing from then on.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the address does not exist or
    /// belongs to someone else, or another `BackendError` if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: ProfileId, id: AddressId) -> Result<(), BackendError> {
        if self.get(user_id, id).await?.is_none() {
            return Err(BackendError::NotFound(format!("address {id}")));
        }
        self.store.delete(tables::ADDRESSES, id.as_uuid()).await
    }

    async fn clear_default(&self, user_id: ProfileId) -> Result<(), BackendError> {
        let query = Query::new()
            .eq("user_id", user_id)
            .eq("is_default", true);
        let defaults: Vec<Address> =
            decode_rows(tables::ADDRESSES, self.store.select(tables::ADDRESSES, &query).await?)?;

        for address in defaults {
            self.store
                .update(
                    tables::ADDRESSES,
                    address.id.as_uuid(),
                    json!({ "is_default": false }),
                )
                .await?;
        }
        Ok(())
    }
}

/// The address to preselect: the default one, else the first.
#[must_use]
pub fn default_for(addresses: &[Address]) -> Option<&Address> {
    addresses
        .iter()
        .find(|a| a.is_default)
        .or_else(|| addresses.first())
}
