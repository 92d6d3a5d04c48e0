//! Profile repository: identities keyed by phone number.

use serde_json::json;
use tracing::instrument;

use community_mart_core::{Phone, ProfileId};

use crate::models::Identity;
use crate::store::{BackendError, DataStore, Query, decode_row, tables};

/// Repository for `profiles` rows.
pub struct ProfileRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// Look up the identity with exactly this phone number.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or the row is malformed.
    #[instrument(skip(self, phone), fields(phone = %phone.masked()))]
    pub async fn find_by_phone(&self, phone: &Phone) -> Result<Option<Identity>, BackendError> {
        let query = Query::new().eq("phone", phone).limit(1);
        let rows = self.store.select(tables::PROFILES, &query).await?;

        rows.into_iter()
            .next()
            .map(|row| decode_row(tables::PROFILES, row))
            .transpose()
    }

    /// Insert a new identity.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Api` with status 409 if the phone is already
    /// registered, or another `BackendError` if the insert fails.
    #[instrument(skip(self, phone, full_name), fields(phone = %phone.masked()))]
    pub async fn create(&self, phone: &Phone, full_name: &str) -> Result<Identity, BackendError> {
        let row = json!({
            "id": ProfileId::generate(),
            "phone": phone,
            "full_name": full_name,
        });
        let inserted = self.store.insert(tables::PROFILES, row).await?;
        decode_row(tables::PROFILES, inserted)
    }

    /// Change an identity's display name.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if the identity does not exist.
    #[instrument(skip(self, full_name))]
    pub async fn update_name(&self, id: ProfileId, full_name: &str) -> Result<Identity, BackendError> {
        let updated = self
            .store
            .update(tables::PROFILES, id.as_uuid(), json!({ "full_name": full_name }))
            .await?;
        decode_row(tables::PROFILES, updated)
    }
}
