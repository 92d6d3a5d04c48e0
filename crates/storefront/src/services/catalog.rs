//! Catalog browsing with an in-memory listing cache.
//!
//! Category and product listings change rarely and are cached with `moka`
//! for the configured TTL. Promotions are time-sensitive and are always
//! fetched fresh.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use tracing::{debug, instrument};

use community_mart_core::CategoryId;

use crate::db::CatalogRepository;
use crate::error::Result;
use crate::models::{Category, Product, PromotionListing};
use crate::store::DataStore;

/// Cache key for catalog listings.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum CacheKey {
    Categories,
    Featured,
    Category(CategoryId),
}

/// Cached value types.
#[derive(Debug, Clone)]
enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Products(Arc<Vec<Product>>),
}

/// Read-only catalog access.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn DataStore>,
    cache: Cache<CacheKey, CacheValue>,
}

impl CatalogService {
    /// Create a catalog service caching listings for `ttl`.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(256)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    fn repo(&self) -> CatalogRepository<'_> {
        CatalogRepository::new(self.store.as_ref())
    }

    /// All categories, by display order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the data API call fails.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>> {
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&CacheKey::Categories).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(self.repo().categories().await?);
        self.cache
            .insert(CacheKey::Categories, CacheValue::Categories(categories.clone()))
            .await;
        Ok(categories)
    }

    /// Active featured products.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the data API call fails.
    #[instrument(skip(self))]
    pub async fn featured_products(&self) -> Result<Arc<Vec<Product>>> {
        if let Some(CacheValue::Products(products)) = self.cache.get(&CacheKey::Featured).await {
            debug!("Cache hit for featured products");
            return Ok(products);
        }

        let products = Arc::new(self.repo().featured_products().await?);
        self.cache
            .insert(CacheKey::Featured, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// Active products of one category.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the data API call fails.
    #[instrument(skip(self))]
    pub async fn products_in_category(&self, category_id: CategoryId) -> Result<Arc<Vec<Product>>> {
        let key = CacheKey::Category(category_id);
        if let Some(CacheValue::Products(products)) = self.cache.get(&key).await {
            debug!("Cache hit for category products");
            return Ok(products);
        }

        let products = Arc::new(self.repo().products_in_category(category_id).await?);
        self.cache
            .insert(key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// Promotions running today (UTC), with their products. Never cached.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the data API call fails.
    #[instrument(skip(self))]
    pub async fn todays_promotions(&self) -> Result<Vec<PromotionListing>> {
        let today = Utc::now().date_naive();
        Ok(self.repo().promotion_listings(today).await?)
    }

    /// Drop every cached listing.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
