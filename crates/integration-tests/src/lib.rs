//! Integration tests for Community Mart against a live data API.
//!
//! # Running Tests
//!
//! ```bash
//! # Point at a backend with the storefront schema loaded
//! export MART_API_URL=https://<project>.example.co
//! export MART_API_KEY=<anon key>
//!
//! cargo test -p community-mart-integration-tests -- --ignored
//! ```
//!
//! Every test logs in with a fresh random phone number and writes its
//! session cache to a temporary directory, so runs do not interfere with
//! each other or with a developer's own session. Rows created by the tests
//! are left in place.

use std::path::Path;

use tempfile::TempDir;
use uuid::Uuid;

use community_mart_storefront::config::StorefrontConfig;
use community_mart_storefront::state::AppState;

/// A live storefront with its own session directory.
pub struct LiveContext {
    pub config: StorefrontConfig,
    data_dir: TempDir,
}

impl LiveContext {
    /// Load `MART_*` configuration and redirect the data directory to a
    /// fresh temporary one.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is missing or the temp dir cannot be made.
    #[must_use]
    pub fn new() -> Self {
        let data_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = StorefrontConfig::from_env().expect("MART_API_URL and MART_API_KEY must be set");
        config.data_dir = data_dir.path().to_path_buf();
        Self { config, data_dir }
    }

    /// Directory holding this context's session cache.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    /// A new process-worth of state over the same session directory.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn state(&self) -> AppState {
        AppState::from_config(self.config.clone()).expect("Failed to build application state")
    }
}

impl Default for LiveContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A random, valid mobile number in the `199` range.
#[must_use]
pub fn test_phone() -> String {
    format!("199{:08}", Uuid::new_v4().as_u128() % 100_000_000)
}
