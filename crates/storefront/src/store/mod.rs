//! Row-oriented access to the hosted data API.
//!
//! # Architecture
//!
//! - The hosted data API is the source of truth - NO local sync, direct calls
//! - Every table is reached through the four operations of [`DataStore`]
//! - Joins (product → category, product → promotion, order → lines) are
//!   composed client-side by the repositories in [`crate::db`]
//!
//! # Implementations
//!
//! - [`RestStore`] - PostgREST-compatible HTTP endpoint (`{api_url}/rest/v1/{table}`)
//! - [`MemoryStore`] - in-process tables for tests and local development
//!
//! # Example
//!
//! ```rust,ignore
//! use community_mart_storefront::store::{DataStore, Query, RestStore, tables};
//!
//! let store = RestStore::new(&config.backend)?;
//! let rows = store
//!     .select(tables::CART_ITEMS, &Query::new().eq("user_id", user_id).order_desc("created_at"))
//!     .await?;
//! ```

mod memory;
mod rest;

pub use memory::{MemoryStore, Operation};
pub use rest::RestStore;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Table names used by the storefront.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const CATEGORIES: &str = "categories";
    pub const PRODUCTS: &str = "products";
    pub const PROMOTIONS: &str = "promotions";
    pub const CART_ITEMS: &str = "cart_items";
    pub const ADDRESSES: &str = "addresses";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
}

/// Errors that can occur when talking to the data store.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Response parsed but did not have the expected shape.
    #[error("Unexpected response shape: {0}")]
    UnexpectedShape(String),

    /// The addressed row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A request URL could not be built.
    #[error("Invalid request URL: {0}")]
    Url(#[from] url::ParseError),

    /// The store refused the request without reaching a table.
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// The four row operations the storefront needs from the data API.
///
/// Rows travel as JSON objects; use [`decode_rows`] and [`encode_row`] to
/// move between rows and model types.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Fetch the rows of `table` matching `query`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Insert one row and return it as stored (with defaults filled in).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError>;

    /// Insert several rows in one request where the store supports it.
    async fn insert_many(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(self.insert(table, row).await?);
        }
        Ok(inserted)
    }

    /// Apply `changes` to the row with primary key `id` and return the updated row.
    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value, BackendError>;

    /// Delete the row with primary key `id`. Deleting a missing row succeeds.
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), BackendError>;
}

// =============================================================================
// Query
// =============================================================================

/// Sort direction for [`Query`] ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A single ordering term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

/// A row filter. Values are carried in their text form, the way they appear
/// in a PostgREST query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq { column: String, value: String },
    Lte { column: String, value: String },
    Gte { column: String, value: String },
    In { column: String, values: Vec<String> },
}

impl Filter {
    /// Column the filter applies to.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Eq { column, .. }
            | Self::Lte { column, .. }
            | Self::Gte { column, .. }
            | Self::In { column, .. } => column,
        }
    }

    /// PostgREST operator expression, e.g. `eq.42` or `in.("a","b")`.
    #[must_use]
    pub fn expression(&self) -> String {
        match self {
            Self::Eq { value, .. } => format!("eq.{value}"),
            Self::Lte { value, .. } => format!("lte.{value}"),
            Self::Gte { value, .. } => format!("gte.{value}"),
            Self::In { values, .. } => {
                let quoted = values
                    .iter()
                    .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
                    .collect::<Vec<_>>()
                    .join(",");
                format!("in.({quoted})")
            }
        }
    }
}

/// Filters, ordering and limit for a `select`.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// An unfiltered query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows where `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Eq {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Keep rows where `column <= value`.
    #[must_use]
    pub fn lte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Lte {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Keep rows where `column >= value`.
    #[must_use]
    pub fn gte(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push(Filter::Gte {
            column: column.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Keep rows where `column` is one of `values`.
    #[must_use]
    pub fn is_in<I>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToString,
    {
        self.filters.push(Filter::In {
            column: column.to_string(),
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Sort ascending by `column` (after any earlier terms).
    #[must_use]
    pub fn order_asc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            direction: Direction::Asc,
        });
        self
    }

    /// Sort descending by `column` (after any earlier terms).
    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            direction: Direction::Desc,
        });
        self
    }

    /// Return at most `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Encode as PostgREST query-string pairs.
    #[must_use]
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];

        params.extend(
            self.filters
                .iter()
                .map(|f| (f.column().to_string(), f.expression())),
        );

        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|o| match o.direction {
                    Direction::Asc => format!("{}.asc", o.column),
                    Direction::Desc => format!("{}.desc", o.column),
                })
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }
}

// =============================================================================
// Row Conversions
// =============================================================================

/// Decode a single row from `table`.
///
/// # Errors
///
/// Returns `BackendError::UnexpectedShape` if the row does not match `T`.
pub fn decode_row<T: DeserializeOwned>(table: &str, row: Value) -> Result<T, BackendError> {
    serde_json::from_value(row)
        .map_err(|e| BackendError::UnexpectedShape(format!("{table} row: {e}")))
}

/// Decode every row from `table`.
///
/// # Errors
///
/// Returns `BackendError::UnexpectedShape` if any row does not match `T`.
pub fn decode_rows<T: DeserializeOwned>(
    table: &str,
    rows: Vec<Value>,
) -> Result<Vec<T>, BackendError> {
    rows.into_iter().map(|row| decode_row(table, row)).collect()
}

/// Encode a model as a row object.
///
/// # Errors
///
/// Returns `BackendError::Parse` if `T` cannot be represented as JSON.
pub fn encode_row<T: Serialize>(row: &T) -> Result<Value, BackendError> {
    Ok(serde_json::to_value(row)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params() {
        let query = Query::new()
            .eq("user_id", "u1")
            .eq("is_active", true)
            .lte("start_date", "2026-10-18")
            .order_desc("created_at")
            .order_asc("name")
            .limit(20);

        assert_eq!(
            query.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("user_id".to_string(), "eq.u1".to_string()),
                ("is_active".to_string(), "eq.true".to_string()),
                ("start_date".to_string(), "lte.2026-10-18".to_string()),
                ("order".to_string(), "created_at.desc,name.asc".to_string()),
                ("limit".to_string(), "20".to_string()),
            ]
        );
    }

    #[test]
    fn test_in_filter_quotes_values() {
        let query = Query::new().is_in("id", ["a", "b\"c"]);
        assert_eq!(
            query.filters[0].expression(),
            "in.(\"a\",\"b\\\"c\")"
        );
    }

    #[test]
    fn test_unfiltered_query_selects_everything() {
        assert_eq!(
            Query::new().to_params(),
            vec![("select".to_string(), "*".to_string())]
        );
    }

    #[test]
    fn test_decode_row_reports_table() {
        #[derive(Debug, serde::Deserialize)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }

        let err = decode_row::<Named>("products", serde_json::json!({"id": 1})).unwrap_err();
        assert!(matches!(err, BackendError::UnexpectedShape(_)));
        assert!(err.to_string().contains("products row"));
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Api {
            status: 409,
            message: "duplicate key".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 409 - duplicate key");

        let err = BackendError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }
}
