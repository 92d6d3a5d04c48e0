//! Fixture rows for unit tests.

#![allow(clippy::unwrap_used)]

use chrono::{NaiveDate, Utc};
use serde_json::{Value, json};

use community_mart_core::{CategoryId, ProductId, ProfileId, PromotionId};

use crate::models::{Identity, NewAddress};
use crate::store::{MemoryStore, tables};

/// Seeds rows into a [`MemoryStore`] without counting requests.
pub struct Fixtures<'a> {
    store: &'a MemoryStore,
}

impl<'a> Fixtures<'a> {
    pub const fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    pub fn identity(&self, phone: &str, name: &str) -> Identity {
        let row = json!({
            "id": ProfileId::generate(),
            "phone": phone,
            "full_name": name,
            "created_at": Utc::now(),
        });
        self.store.seed(tables::PROFILES, [row.clone()]);
        serde_json::from_value(row).unwrap()
    }

    pub fn category(&self, name: &str, sort_order: i32) -> CategoryId {
        let id = CategoryId::generate();
        self.store.seed(
            tables::CATEGORIES,
            [json!({"id": id, "name": name, "icon": "🍎", "sort_order": sort_order})],
        );
        id
    }

    pub fn product(&self, category: CategoryId, name: &str, price: &str) -> ProductId {
        self.product_with(category, name, price, |_| {})
    }

    pub fn product_with<F>(&self, category: CategoryId, name: &str, price: &str, tweak: F) -> ProductId
    where
        F: FnOnce(&mut Value),
    {
        let id = ProductId::generate();
        let mut row = json!({
            "id": id,
            "category_id": category,
            "name": name,
            "description": null,
            "price": price,
            "original_price": null,
            "unit": "kg",
            "image_url": null,
            "stock": 100,
            "is_active": true,
            "is_featured": false,
        });
        tweak(&mut row);
        self.store.seed(tables::PRODUCTS, [row]);
        id
    }

    pub fn promotion(&self, product: ProductId, price: &str, start: &str, end: &str) -> PromotionId {
        let id = PromotionId::generate();
        self.store.seed(
            tables::PROMOTIONS,
            [json!({
                "id": id,
                "product_id": product,
                "promotion_price": price,
                "start_date": start,
                "end_date": end,
                "is_active": true,
            })],
        );
        id
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A promotion window that contains today, whatever day the tests run.
pub fn around_today() -> (String, String) {
    let today = Utc::now().date_naive();
    let start = today - chrono::TimeDelta::days(1);
    let end = today + chrono::TimeDelta::days(1);
    (start.to_string(), end.to_string())
}

pub fn new_address(recipient: &str, is_default: bool) -> NewAddress {
    NewAddress {
        recipient_name: recipient.to_string(),
        phone: "13800000000".to_string(),
        province: "浙江省".to_string(),
        city: "杭州市".to_string(),
        district: "西湖区".to_string(),
        detail_address: "文三路 1 号".to_string(),
        is_default,
    }
}
