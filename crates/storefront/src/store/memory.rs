//! In-process implementation of [`DataStore`].
//!
//! Tables are vectors of JSON objects behind a mutex. Filters and ordering
//! follow PostgREST semantics closely enough for the storefront's queries:
//! equality compares text forms, range filters compare numerically when both
//! sides are numbers and lexically otherwise (ISO dates sort correctly).
//!
//! Inserts fill `id` and `created_at` when the caller leaves them out, the
//! way column defaults do. `created_at` values are strictly increasing so
//! newest-first ordering is deterministic.
//!
//! Beyond the trait, the store can count requests, declare unique keys, and
//! fail the next request of a given kind, which is what the storefront's
//! tests need from a backend double.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{BackendError, DataStore, Direction, Filter, Query};

/// Kind of request, for [`MemoryStore::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

/// In-memory data store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Map<String, Value>>>,
    unique_keys: HashMap<String, Vec<Vec<String>>>,
    pending_failures: Vec<(Operation, String)>,
    requests: usize,
    last_created_at: Option<DateTime<Utc>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `columns` must be unique together in `table`.
    ///
    /// Inserts and updates that would duplicate a key fail with a 409
    /// `BackendError::Api`, like a unique constraint would.
    pub fn unique(&self, table: &str, columns: &[&str]) {
        self.lock()
            .unique_keys
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| (*c).to_string()).collect());
    }

    /// Load fixture rows without counting them as requests.
    ///
    /// # Panics
    ///
    /// Panics if a row is not a JSON object.
    #[allow(clippy::panic)]
    pub fn seed<I>(&self, table: &str, rows: I)
    where
        I: IntoIterator<Item = Value>,
    {
        let mut state = self.lock();
        for row in rows {
            let Value::Object(mut row) = row else {
                panic!("fixture rows for {table} must be JSON objects");
            };
            state.fill_defaults(&mut row);
            state.tables.entry(table.to_string()).or_default().push(row);
        }
    }

    /// Current contents of `table`, in insertion order.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock()
            .tables
            .get(table)
            .map(|rows| rows.iter().cloned().map(Value::Object).collect())
            .unwrap_or_default()
    }

    /// Number of trait requests served so far (failed ones included).
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests
    }

    /// Make the next `operation` on `table` fail with `BackendError::Unavailable`.
    pub fn fail_next(&self, operation: Operation, table: &str) {
        self.lock()
            .pending_failures
            .push((operation, table.to_string()));
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the request and consume a matching injected failure, if any.
    fn begin(&self, operation: Operation, table: &str) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        let mut state = self.lock();
        state.requests += 1;

        if let Some(pos) = state
            .pending_failures
            .iter()
            .position(|(op, t)| *op == operation && t == table)
        {
            state.pending_failures.remove(pos);
            return Err(BackendError::Unavailable(format!(
                "injected {operation:?} failure on {table}"
            )));
        }

        Ok(state)
    }
}

impl MemoryState {
    fn fill_defaults(&mut self, row: &mut Map<String, Value>) {
        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !row.contains_key("created_at") {
            let created_at = self.next_timestamp();
            row.insert("created_at".to_string(), Value::String(created_at));
        }
    }

    /// A creation timestamp strictly later than every one handed out before.
    fn next_timestamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_created_at {
            if now <= last {
                now = last + TimeDelta::microseconds(1);
            }
        }
        self.last_created_at = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn check_unique(
        &self,
        table: &str,
        candidate: &Map<String, Value>,
        skip_id: Option<&str>,
    ) -> Result<(), BackendError> {
        let (Some(keys), Some(rows)) = (self.unique_keys.get(table), self.tables.get(table)) else {
            return Ok(());
        };

        for key in keys {
            let duplicate = rows.iter().any(|row| {
                skip_id.is_none_or(|id| text(row.get("id")) != id)
                    && key.iter().all(|col| text(row.get(col)) == text(candidate.get(col)))
            });
            if duplicate {
                return Err(BackendError::Api {
                    status: 409,
                    message: format!(
                        "duplicate key value violates unique constraint on {table} ({})",
                        key.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let state = self.begin(Operation::Select, table)?;

        let mut rows: Vec<&Map<String, Value>> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|f| matches(f, row)))
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query
                .order
                .iter()
                .map(|o| {
                    let ord = compare(a.get(&o.column), b.get(&o.column));
                    match o.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .take(limit)
            .cloned()
            .map(Value::Object)
            .collect())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let mut state = self.begin(Operation::Insert, table)?;

        let Value::Object(mut row) = row else {
            return Err(BackendError::Api {
                status: 400,
                message: format!("insert into {table} expects an object"),
            });
        };
        state.fill_defaults(&mut row);
        state.check_unique(table, &row, None)?;

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value, BackendError> {
        let mut state = self.begin(Operation::Update, table)?;

        let Value::Object(changes) = changes else {
            return Err(BackendError::Api {
                status: 400,
                message: format!("update of {table} expects an object"),
            });
        };

        let id = id.to_string();
        let current = state
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|row| text(row.get("id")) == id))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("{table} row {id}")))?;

        let mut updated = current;
        updated.extend(changes);
        state.check_unique(table, &updated, Some(&id))?;

        if let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| text(row.get("id")) == id))
        {
            row.clone_from(&updated);
        }
        Ok(Value::Object(updated))
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), BackendError> {
        let mut state = self.begin(Operation::Delete, table)?;

        let id = id.to_string();
        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| text(row.get("id")) != id);
        }
        Ok(())
    }
}

/// Text form of a column value, as it would appear in a query string.
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn matches(filter: &Filter, row: &Map<String, Value>) -> bool {
    let value = row.get(filter.column());
    match filter {
        Filter::Eq { value: expected, .. } => text(value) == *expected,
        Filter::Lte { value: bound, .. } => compare_text(&text(value), bound) != Ordering::Greater,
        Filter::Gte { value: bound, .. } => compare_text(&text(value), bound) != Ordering::Less,
        Filter::In { values, .. } => values.contains(&text(value)),
    }
}

/// Compare two text forms numerically when both are numbers, else lexically.
fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Order two column values; nulls sort last.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => compare_text(&text(Some(x)), &text(Some(y))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_insert_fills_id_and_created_at() {
        let store = MemoryStore::new();
        let row = store
            .insert("categories", json!({"name": "Fruit"}))
            .await
            .unwrap();

        assert!(Uuid::parse_str(row["id"].as_str().unwrap()).is_ok());
        assert!(row["created_at"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_created_at_strictly_increases() {
        let store = MemoryStore::new();
        let a = store.insert("t", json!({})).await.unwrap();
        let b = store.insert("t", json!({})).await.unwrap();
        assert!(b["created_at"].as_str().unwrap() > a["created_at"].as_str().unwrap());
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let store = MemoryStore::new();
        store.seed(
            "categories",
            [
                json!({"name": "Dairy", "sort_order": 3, "visible": true}),
                json!({"name": "Fruit", "sort_order": 1, "visible": true}),
                json!({"name": "Meat", "sort_order": 10, "visible": false}),
                json!({"name": "Bakery", "sort_order": 2, "visible": true}),
            ],
        );

        let rows = store
            .select(
                "categories",
                &Query::new().eq("visible", true).order_asc("sort_order").limit(2),
            )
            .await
            .unwrap();

        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["Fruit", "Bakery"]);
    }

    #[tokio::test]
    async fn test_range_filters_compare_numbers_and_dates() {
        let store = MemoryStore::new();
        store.seed(
            "promotions",
            [
                json!({"label": "past", "start_date": "2026-01-01", "end_date": "2026-01-31"}),
                json!({"label": "current", "start_date": "2026-10-01", "end_date": "2026-10-31"}),
                json!({"label": "future", "start_date": "2026-12-01", "end_date": "2026-12-31"}),
            ],
        );

        let rows = store
            .select(
                "promotions",
                &Query::new()
                    .lte("start_date", "2026-10-18")
                    .gte("end_date", "2026-10-18"),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["label"], "current");

        // 9 < 10 numerically even though "9" > "10" lexically
        store.seed("n", [json!({"v": 9}), json!({"v": 10})]);
        let rows = store.select("n", &Query::new().lte("v", 9)).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_in_filter() {
        let store = MemoryStore::new();
        store.seed("t", [json!({"k": "a"}), json!({"k": "b"}), json!({"k": "c"})]);
        let rows = store
            .select("t", &Query::new().is_in("k", ["a", "c"]))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let row = store
            .insert("cart_items", json!({"quantity": 2, "product_id": "p"}))
            .await
            .unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        let updated = store
            .update("cart_items", id, json!({"quantity": 5}))
            .await
            .unwrap();
        assert_eq!(updated["quantity"], 5);
        assert_eq!(updated["product_id"], "p");
        assert_eq!(store.rows("cart_items")[0]["quantity"], 5);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update("cart_items", Uuid::new_v4(), json!({"quantity": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryStore::new();
        let row = store.insert("t", json!({})).await.unwrap();
        let id = Uuid::parse_str(row["id"].as_str().unwrap()).unwrap();

        store.delete("t", id).await.unwrap();
        store.delete("t", id).await.unwrap();
        assert!(store.rows("t").is_empty());
    }

    #[tokio::test]
    async fn test_unique_key_rejects_duplicates() {
        let store = MemoryStore::new();
        store.unique("profiles", &["phone"]);
        store
            .insert("profiles", json!({"phone": "13800000000"}))
            .await
            .unwrap();

        let err = store
            .insert("profiles", json!({"phone": "13800000000"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed_once() {
        let store = MemoryStore::new();
        store.fail_next(Operation::Select, "t");

        assert!(store.select("t", &Query::new()).await.is_err());
        assert!(store.select("t", &Query::new()).await.is_ok());
        assert_eq!(store.request_count(), 2);
    }

    #[tokio::test]
    async fn test_seed_does_not_count_requests() {
        let store = MemoryStore::new();
        store.seed("t", [json!({})]);
        assert_eq!(store.request_count(), 0);
        assert_eq!(store.rows("t").len(), 1);
    }
}
