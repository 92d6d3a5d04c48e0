//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type for every storefront operation. Callers
//! that give up on an error (the CLI, the cart reconciler's reload path)
//! hand it to [`AppError::report`], which logs it and captures the kinds that
//! point at a broken backend to Sentry.

use thiserror::Error;

use community_mart_core::PhoneError;

use crate::config::ConfigError;
use crate::services::session_cache::SessionCacheError;
use crate::store::BackendError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Phone number failed validation.
    #[error("Invalid phone number: {0}")]
    InvalidPhone(#[from] PhoneError),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The data API call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// The local session cache could not be read or written.
    #[error("Session cache error: {0}")]
    Cache(#[from] SessionCacheError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No user is logged in.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Whether the error was caused by the caller's input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidPhone(_) | Self::Validation(_))
    }

    /// Log the error, capturing backend and cache failures to Sentry.
    ///
    /// Returns the Sentry event ID when one was captured.
    pub fn report(&self) -> Option<uuid::Uuid> {
        if matches!(self, Self::Backend(_) | Self::Cache(_)) {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Operation failed"
            );
            Some(event_id)
        } else {
            tracing::info!(error = %self, "Operation rejected");
            None
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after login or session restore to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, username: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            username: username.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123"), ("quantity", "2")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("address 42".to_string());
        assert_eq!(err.to_string(), "Not found: address 42");

        let err = AppError::Validation("quantity must be at least 1".to_string());
        assert_eq!(err.to_string(), "Validation error: quantity must be at least 1");

        let err = AppError::from(PhoneError::Empty);
        assert!(err.to_string().starts_with("Invalid phone number"));
    }

    #[test]
    fn test_is_validation() {
        assert!(AppError::from(PhoneError::InvalidPrefix).is_validation());
        assert!(AppError::Validation("blank name".to_string()).is_validation());
        assert!(!AppError::Unauthorized("login first".to_string()).is_validation());
        assert!(!AppError::from(BackendError::RateLimited(1)).is_validation());
    }

    #[test]
    fn test_report_captures_only_backend_failures() {
        assert!(AppError::Validation("blank".to_string()).report().is_none());
        assert!(
            AppError::from(BackendError::Unavailable("down".to_string()))
                .report()
                .is_some()
        );
    }
}
