//! Catalog repository: categories, products and promotions.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::instrument;

use community_mart_core::{CategoryId, ProductId};

use super::distinct;
use crate::models::{Category, Product, ProductSnapshot, Promotion, PromotionListing};
use crate::store::{BackendError, DataStore, Query, decode_rows, tables};

/// Maximum number of featured products returned.
pub const FEATURED_LIMIT: usize = 20;

/// Repository for the read-only catalog tables.
pub struct CatalogRepository<'a> {
    store: &'a dyn DataStore,
}

impl<'a> CatalogRepository<'a> {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(store: &'a dyn DataStore) -> Self {
        Self { store }
    }

    /// All categories, by `sort_order`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Result<Vec<Category>, BackendError> {
        let rows = self
            .store
            .select(tables::CATEGORIES, &Query::new().order_asc("sort_order"))
            .await?;
        decode_rows(tables::CATEGORIES, rows)
    }

    /// Active featured products, at most [`FEATURED_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn featured_products(&self) -> Result<Vec<Product>, BackendError> {
        let query = Query::new()
            .eq("is_featured", true)
            .eq("is_active", true)
            .limit(FEATURED_LIMIT);
        let rows = self.store.select(tables::PRODUCTS, &query).await?;
        decode_rows(tables::PRODUCTS, rows)
    }

    /// Active products of one category.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn products_in_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<Product>, BackendError> {
        let query = Query::new()
            .eq("category_id", category_id)
            .eq("is_active", true);
        let rows = self.store.select(tables::PRODUCTS, &query).await?;
        decode_rows(tables::PRODUCTS, rows)
    }

    /// Promotions active on `date`, optionally restricted to some products.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the query fails or a row is malformed.
    #[instrument(skip(self, product_ids))]
    pub async fn active_promotions(
        &self,
        date: NaiveDate,
        product_ids: Option<&[ProductId]>,
    ) -> Result<Vec<Promotion>, BackendError> {
        let day = date.format("%Y-%m-%d").to_string();
        let mut query = Query::new()
            .eq("is_active", true)
            .lte("start_date", &day)
            .gte("end_date", &day);
        if let Some(ids) = product_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.is_in("product_id", ids);
        }

        let rows = self.store.select(tables::PROMOTIONS, &query).await?;
        decode_rows(tables::PROMOTIONS, rows)
    }

    /// Promotions active on `date`, each with its product and category.
    ///
    /// Promotions whose product is missing or inactive are left out.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if a query fails or a row is malformed.
    #[instrument(skip(self))]
    pub async fn promotion_listings(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<PromotionListing>, BackendError> {
        let promotions = self.active_promotions(date, None).await?;
        let product_ids = distinct(&promotions, |p| p.product_id);
        let products = self.products_by_id(&product_ids).await?;
        let categories = self.categories_by_id(&category_ids(&products)).await?;

        Ok(promotions
            .into_iter()
            .filter_map(|promotion| {
                let product = products.get(&promotion.product_id)?;
                product.is_active.then(|| PromotionListing {
                    category: categories.get(&product.category_id).cloned(),
                    product: product.clone(),
                    promotion,
                })
            })
            .collect())
    }

    /// Snapshots (product, category, promotion active on `date`) for the
    /// given products, keyed by product ID.
    ///
    /// Products that do not exist are absent from the map. If several
    /// promotions for one product are active on `date`, the lowest price wins.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if a query fails or a row is malformed.
    #[instrument(skip(self, product_ids), fields(products = product_ids.len()))]
    pub async fn snapshots(
        &self,
        product_ids: &[ProductId],
        date: NaiveDate,
    ) -> Result<HashMap<ProductId, ProductSnapshot>, BackendError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let products = self.products_by_id(product_ids).await?;
        let categories = self.categories_by_id(&category_ids(&products)).await?;

        let mut promotions: HashMap<ProductId, Promotion> = HashMap::new();
        for promotion in self.active_promotions(date, Some(product_ids)).await? {
            let better = promotions
                .get(&promotion.product_id)
                .is_none_or(|current| promotion.promotion_price < current.promotion_price);
            if better {
                promotions.insert(promotion.product_id, promotion);
            }
        }

        Ok(products
            .into_iter()
            .map(|(id, product)| {
                let snapshot = ProductSnapshot {
                    category: categories.get(&product.category_id).cloned(),
                    promotion: promotions.remove(&id),
                    product,
                };
                (id, snapshot)
            })
            .collect())
    }

    async fn products_by_id(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, BackendError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .store
            .select(tables::PRODUCTS, &Query::new().is_in("id", ids))
            .await?;
        let products: Vec<Product> = decode_rows(tables::PRODUCTS, rows)?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn categories_by_id(
        &self,
        ids: &[CategoryId],
    ) -> Result<HashMap<CategoryId, Category>, BackendError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = self
            .store
            .select(tables::CATEGORIES, &Query::new().is_in("id", ids))
            .await?;
        let categories: Vec<Category> = decode_rows(tables::CATEGORIES, rows)?;
        Ok(categories.into_iter().map(|c| (c.id, c)).collect())
    }
}

fn category_ids(products: &HashMap<ProductId, Product>) -> Vec<CategoryId> {
    let products: Vec<&Product> = products.values().collect();
    distinct(&products, |p| p.category_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use community_mart_core::Price;

    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{Fixtures, date};

    #[tokio::test]
    async fn test_categories_sorted() {
        let store = MemoryStore::new();
        let fx = Fixtures::new(&store);
        fx.category("Dairy", 2);
        fx.category("Fruit", 1);

        let categories = CatalogRepository::new(&store).categories().await.unwrap();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Fruit", "Dairy"]);
    }

    #[tokio::test]
    async fn test_featured_products_only_active_and_featured() {
        let store = MemoryStore::new();
        let fx = Fixtures::new(&store);
        let fruit = fx.category("Fruit", 1);
        fx.product_with(fruit, "Apple", "5", |p| p["is_featured"] = true.into());
        fx.product_with(fruit, "Pear", "6", |p| {
            p["is_featured"] = true.into();
            p["is_active"] = false.into();
        });
        fx.product(fruit, "Plum", "7");

        let featured = CatalogRepository::new(&store)
            .featured_products()
            .await
            .unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured[0].name, "Apple");
    }

    #[tokio::test]
    async fn test_products_in_category() {
        let store = MemoryStore::new();
        let fx = Fixtures::new(&store);
        let fruit = fx.category("Fruit", 1);
        let dairy = fx.category("Dairy", 2);
        fx.product(fruit, "Apple", "5");
        fx.product(dairy, "Milk", "12");

        let products = CatalogRepository::new(&store)
            .products_in_category(dairy)
            .await
            .unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Milk");
    }

    #[tokio::test]
    async fn test_promotion_listings_for_today() {
        let store = MemoryStore::new();
        let fx = Fixtures::new(&store);
        let fruit = fx.category("Fruit", 1);
        let apple = fx.product(fruit, "Apple", "10");
        let pear = fx.product(fruit, "Pear", "8");
        fx.promotion(apple, "7", "2026-10-01", "2026-10-31");
        fx.promotion(pear, "6", "2026-11-01", "2026-11-30");

        let listings = CatalogRepository::new(&store)
            .promotion_listings(date("2026-10-18"))
            .await
            .unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].product.name, "Apple");
        assert_eq!(listings[0].category.as_ref().unwrap().name, "Fruit");
        assert_eq!(listings[0].savings(), Price::from_fen(300));
    }

    #[tokio::test]
    async fn test_snapshots_pick_lowest_active_promotion() {
        let store = MemoryStore::new();
        let fx = Fixtures::new(&store);
        let fruit = fx.category("Fruit", 1);
        let apple = fx.product(fruit, "Apple", "10");
        fx.promotion(apple, "8", "2026-10-01", "2026-10-31");
        fx.promotion(apple, "7", "2026-10-15", "2026-10-20");

        let snapshots = CatalogRepository::new(&store)
            .snapshots(&[apple], date("2026-10-18"))
            .await
            .unwrap();
        let snapshot = &snapshots[&apple];
        assert_eq!(snapshot.promotion.as_ref().unwrap().promotion_price, Price::from_fen(700));
        assert_eq!(snapshot.category.as_ref().unwrap().id, fruit);
    }

    #[tokio::test]
    async fn test_snapshots_skip_queries_for_no_products() {
        let store = MemoryStore::new();
        let snapshots = CatalogRepository::new(&store)
            .snapshots(&[], date("2026-10-18"))
            .await
            .unwrap();
        assert!(snapshots.is_empty());
        assert_eq!(store.request_count(), 0);
    }
}
