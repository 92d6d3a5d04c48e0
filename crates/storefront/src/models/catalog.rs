//! Catalog rows: categories, products and promotions.
//!
//! All three tables are read-only from the storefront's point of view.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use community_mart_core::{CategoryId, Price, ProductId, PromotionId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    /// Emoji or icon name shown next to the category.
    #[serde(default)]
    pub icon: String,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Base unit price.
    pub price: Price,
    /// Struck-through "was" price, for display only.
    #[serde(default)]
    pub original_price: Option<Price>,
    /// Sales unit, e.g. "斤" or "box".
    pub unit: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub stock: i32,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
}

/// A time-boxed special price for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: PromotionId,
    pub product_id: ProductId,
    pub promotion_price: Price,
    /// First day the promotion applies (inclusive).
    #[serde(with = "calendar_date")]
    pub start_date: NaiveDate,
    /// Last day the promotion applies (inclusive).
    #[serde(with = "calendar_date")]
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Promotion {
    /// Whether the promotion applies on `date`.
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.is_active && self.start_date <= date && date <= self.end_date
    }
}

/// A product together with its category and current promotion.
///
/// This is the snapshot embedded in every cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSnapshot {
    pub product: Product,
    pub category: Option<Category>,
    pub promotion: Option<Promotion>,
}

impl ProductSnapshot {
    /// Unit price on `date`: the promotion price if the promotion is active
    /// that day, the base price otherwise.
    #[must_use]
    pub fn effective_price(&self, date: NaiveDate) -> Price {
        match &self.promotion {
            Some(promotion) if promotion.is_active_on(date) => promotion.promotion_price,
            _ => self.product.price,
        }
    }
}

/// A promotion joined with its product, for the "today's deals" listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionListing {
    pub promotion: Promotion,
    pub product: Product,
    pub category: Option<Category>,
}

impl PromotionListing {
    /// Amount saved per unit against the base price (never negative).
    #[must_use]
    pub fn savings(&self) -> Price {
        let saved = self.product.price.amount() - self.promotion.promotion_price.amount();
        if saved.is_sign_negative() {
            Price::ZERO
        } else {
            Price::new(saved)
        }
    }
}

/// `date` columns, accepting both `2026-10-18` and full timestamps.
///
/// Only the calendar date is kept; a timestamp's time and offset are ignored.
mod calendar_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let day = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(day, FORMAT)
            .map_err(|e| de::Error::custom(format!("invalid date {raw:?}: {e}")))
    }
}
