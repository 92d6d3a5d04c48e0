//! Application state: the logged-in identity and everything scoped to it.
//!
//! One [`AppState`] lives for the whole process. It owns the identity
//! context explicitly and hands it to the cart reconciler whenever it
//! changes, so there is no global "current user".

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use community_mart_core::AddressId;

use crate::config::StorefrontConfig;
use crate::db::{AddressRepository, OrderRepository};
use crate::error::{AppError, Result};
use crate::models::{Address, Identity, NewAddress, OrderDetails, OrderFilter};
use crate::services::{
    CartReconciler, CatalogService, Checkout, FileSessionCache, IdentityResolver, SessionCache,
};
use crate::store::{BackendError, DataStore, RestStore};

/// Storefront state for one process.
pub struct AppState {
    config: Option<StorefrontConfig>,
    store: Arc<dyn DataStore>,
    identities: IdentityResolver,
    identity: Option<Identity>,
    cart: CartReconciler,
    catalog: CatalogService,
}

impl AppState {
    /// Create state backed by the hosted data API and the on-disk session
    /// cache under the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the HTTP client cannot be built.
    pub fn from_config(config: StorefrontConfig) -> Result<Self> {
        let store: Arc<dyn DataStore> = Arc::new(RestStore::new(&config.backend)?);
        let cache: Arc<dyn SessionCache> = Arc::new(FileSessionCache::new(config.session_dir()));
        let mut state = Self::with_parts(store, cache, config.catalog_cache_ttl);
        state.config = Some(config);
        Ok(state)
    }

    /// Create state over explicit parts, logged out.
    #[must_use]
    pub fn with_parts(
        store: Arc<dyn DataStore>,
        cache: Arc<dyn SessionCache>,
        catalog_ttl: Duration,
    ) -> Self {
        Self {
            config: None,
            identities: IdentityResolver::new(store.clone(), cache),
            identity: None,
            cart: CartReconciler::new(store.clone()),
            catalog: CatalogService::new(store.clone(), catalog_ttl),
            store,
        }
    }

    /// Configuration this state was built from, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&StorefrontConfig> {
        self.config.as_ref()
    }

    /// Pick up the identity saved by the last login and load its cart.
    ///
    /// A cart that fails to load is reported and left empty; the identity is
    /// still restored.
    #[instrument(skip(self))]
    pub async fn restore(&mut self) -> Option<&Identity> {
        self.identity = self.identities.restore().await;
        self.switch_cart().await;
        self.identity.as_ref()
    }

    /// Log in with a phone number and display name, then switch the cart to
    /// the new identity.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error; the previous session is left as it was.
    #[instrument(skip(self, phone, display_name))]
    pub async fn login(&mut self, phone: &str, display_name: &str) -> Result<&Identity> {
        let identity = self.identities.resolve(phone, display_name).await?;
        self.identity = Some(identity);
        self.switch_cart().await;
        self.require_identity()
    }

    /// Forget the identity and empty the cart view.
    #[instrument(skip(self))]
    pub async fn logout(&mut self) {
        self.identities.forget().await;
        self.identity = None;
        self.switch_cart().await;
    }

    async fn switch_cart(&mut self) {
        // Reload failures are reported by the reconciler itself
        if let Err(e) = self.cart.set_active_identity(self.identity.as_ref()).await {
            debug!(error = %e, "Cart left empty after identity change");
        }
    }

    /// The logged-in identity, if any.
    #[must_use]
    pub const fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// The logged-in identity.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when logged out.
    pub fn require_identity(&self) -> Result<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("log in first".to_string()))
    }

    /// Cart view of the logged-in identity.
    #[must_use]
    pub const fn cart(&self) -> &CartReconciler {
        &self.cart
    }

    /// Mutable cart view of the logged-in identity.
    pub const fn cart_mut(&mut self) -> &mut CartReconciler {
        &mut self.cart
    }

    /// Catalog access.
    #[must_use]
    pub const fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    fn addresses_repo(&self) -> AddressRepository<'_> {
        AddressRepository::new(self.store.as_ref())
    }

    /// The logged-in user's addresses, default first, then newest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when logged out, or
    /// `AppError::Backend` if the query fails.
    pub async fn addresses(&self) -> Result<Vec<Address>> {
        let user = self.require_identity()?;
        Ok(self.addresses_repo().list(user.id).await?)
    }

    /// Save a new address for the logged-in user.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when logged out,
    /// `AppError::Validation` if a field is blank, or `AppError::Backend` if
    /// a write fails.
    pub async fn add_address(&self, address: &NewAddress) -> Result<Address> {
        let user = self.require_identity()?;
        if let Some(field) = address.first_blank_field() {
            return Err(AppError::Validation(format!("{field} must not be blank")));
        }
        Ok(self.addresses_repo().create(user.id, address).await?)
    }

    /// Make one of the logged-in user's addresses the default.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address is not theirs,
    /// `AppError::Unauthorized` when logged out, or `AppError::Backend` if a
    /// write fails.
    pub async fn set_default_address(&self, id: AddressId) -> Result<Address> {
        let user = self.require_identity()?;
        self.addresses_repo()
            .set_default(user.id, id)
            .await
            .map_err(not_found)
    }

    /// Delete one of the logged-in user's addresses.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the address is not theirs,
    /// `AppError::Unauthorized` when logged out, or `AppError::Backend` if
    /// the delete fails.
    pub async fn delete_address(&self, id: AddressId) -> Result<()> {
        let user = self.require_identity()?;
        self.addresses_repo()
            .delete(user.id, id)
            .await
            .map_err(not_found)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place an order for the current cart view.
    ///
    /// # Errors
    ///
    /// See [`Checkout::place_order`]; `AppError::Unauthorized` when logged out.
    pub async fn checkout(&self, address_id: Option<AddressId>) -> Result<OrderDetails> {
        let user = self.require_identity()?;
        Checkout::new(self.store.as_ref())
            .place_order(user, &self.cart, address_id)
            .await
    }

    /// The logged-in user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when logged out, or
    /// `AppError::Backend` if a query fails.
    pub async fn orders(&self, filter: OrderFilter) -> Result<Vec<OrderDetails>> {
        let user = self.require_identity()?;
        Ok(OrderRepository::new(self.store.as_ref())
            .list(user.id, filter)
            .await?)
    }
}

fn not_found(err: BackendError) -> AppError {
    match err {
        BackendError::NotFound(what) => AppError::NotFound(what),
        other => AppError::Backend(other),
    }
}
