//! PostgREST-compatible HTTP client for the hosted data API.
//!
//! Uses `reqwest` with default headers for the API key. Every call goes
//! straight to the API; nothing here is cached.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use super::{BackendError, DataStore, Query};
use crate::config::BackendConfig;

/// Asks the API to echo back inserted/updated rows.
const RETURN_REPRESENTATION: &str = "return=representation";

/// Client for a PostgREST-style REST endpoint.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestStoreInner>,
}

struct RestStoreInner {
    client: reqwest::Client,
    config: BackendConfig,
}

impl RestStore {
    /// Create a new REST client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();

        let api_key = config.api_key.expose_secret();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key)
                .map_err(|e| BackendError::Unavailable(format!("Invalid API key format: {e}")))?,
        );
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| BackendError::Unavailable(format!("Invalid API key format: {e}")))?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestStoreInner {
                client,
                config: config.clone(),
            }),
        })
    }

    /// Build the URL of `table` with the given query-string pairs.
    fn url(&self, table: &str, params: &[(String, String)]) -> Result<Url, BackendError> {
        let mut url = self.inner.config.table_url(table)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// URL addressing the single row with primary key `id`.
    fn row_url(&self, table: &str, id: Uuid) -> Result<Url, BackendError> {
        self.url(table, &[("id".to_string(), format!("eq.{id}"))])
    }

    /// Send a request and return the response body.
    ///
    /// Maps 429 to `RateLimited` and any other non-success status to `Api`.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<String, BackendError> {
        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(BackendError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Data API returned non-success status"
            );
            return Err(BackendError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        Ok(body)
    }

    /// Send a request whose response is a JSON array of rows.
    async fn execute_rows(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<Value>, BackendError> {
        let body = self.execute(request).await?;

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse data API response"
            );
            BackendError::Parse(e)
        })?;

        match value {
            Value::Array(rows) => Ok(rows),
            other => Err(BackendError::UnexpectedShape(format!(
                "expected an array of rows, got {}",
                json_kind(&other)
            ))),
        }
    }
}

#[async_trait]
impl DataStore for RestStore {
    #[instrument(skip(self, query), fields(table = %table))]
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError> {
        let url = self.url(table, &query.to_params())?;
        let rows = self.execute_rows(self.inner.client.get(url)).await?;
        debug!(rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(skip(self, row), fields(table = %table))]
    async fn insert(&self, table: &str, row: Value) -> Result<Value, BackendError> {
        let url = self.url(table, &[])?;
        let request = self
            .inner
            .client
            .post(url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);

        self.execute_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::UnexpectedShape(format!("insert into {table} returned no row")))
    }

    #[instrument(skip(self, rows), fields(table = %table, count = rows.len()))]
    async fn insert_many(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>, BackendError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(table, &[])?;
        let request = self
            .inner
            .client
            .post(url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&rows);

        self.execute_rows(request).await
    }

    #[instrument(skip(self, changes), fields(table = %table, id = %id))]
    async fn update(&self, table: &str, id: Uuid, changes: Value) -> Result<Value, BackendError> {
        let url = self.row_url(table, id)?;
        let request = self
            .inner
            .client
            .patch(url)
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&changes);

        // PostgREST answers an update of a missing row with an empty array
        self.execute_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("{table} row {id}")))
    }

    #[instrument(skip(self), fields(table = %table, id = %id))]
    async fn delete(&self, table: &str, id: Uuid) -> Result<(), BackendError> {
        let url = self.row_url(table, id)?;
        self.execute(self.inner.client.delete(url)).await?;
        Ok(())
    }
}

/// Pull the human-readable message out of a PostgREST error body.
///
/// Falls back to (a prefix of) the raw body when it is not the usual
/// `{"message": ...}` object.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;

    use super::*;

    fn store() -> RestStore {
        RestStore::new(&BackendConfig {
            api_url: Url::parse("https://abc.supabase.co").unwrap(),
            rest_path: "rest/v1".to_string(),
            api_key: SecretString::from("anon-key"),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_select_url_encodes_query() {
        let query = Query::new()
            .eq("user_id", "42")
            .order_desc("created_at");
        let url = store().url("cart_items", &query.to_params()).unwrap();

        assert_eq!(url.path(), "/rest/v1/cart_items");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("user_id".to_string(), "eq.42".to_string())));
        assert!(pairs.contains(&("order".to_string(), "created_at.desc".to_string())));
    }

    #[test]
    fn test_row_url() {
        let id = Uuid::nil();
        let url = store().row_url("cart_items", id).unwrap();
        assert_eq!(
            url.query(),
            Some("id=eq.00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_api_error_message_from_json() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":null}"#;
        assert_eq!(api_error_message(body), "duplicate key value");
    }

    #[test]
    fn test_api_error_message_falls_back_to_body() {
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_invalid_api_key_rejected() {
        let result = RestStore::new(&BackendConfig {
            api_url: Url::parse("https://abc.supabase.co").unwrap(),
            rest_path: "rest/v1".to_string(),
            api_key: SecretString::from("bad\nkey"),
            timeout: Duration::from_secs(5),
        });
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }
}
