//! Cart reconciliation against the remote store.
//!
//! The data API is the source of truth for the cart. [`CartReconciler`]
//! keeps a local view of the active identity's lines for display and
//! totals, and rebuilds that view from the remote rows after every mutation
//! instead of patching it locally.
//!
//! # Quantity merge
//!
//! Adding a product that already has a line increments that line; a line is
//! never duplicated by this session. The check-then-write is not atomic, so
//! two sessions adding the same product at the same moment can still end up
//! with two lines. [`CartRepository::find`] merges into the oldest one when
//! that happens.
//!
//! # Prices
//!
//! Totals use each line's effective unit price: the promotion price while
//! its promotion is active, the base price otherwise. The date is taken at
//! every call, so a promotion ending at midnight stops counting without a
//! reload.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{debug, instrument};

use community_mart_core::{CartItemId, Price, ProductId, ProfileId};

use crate::db::CartRepository;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CartLine, Identity};
use crate::store::DataStore;

/// Local view of the active identity's cart.
pub struct CartReconciler {
    store: Arc<dyn DataStore>,
    user_id: Option<ProfileId>,
    lines: Vec<CartLine>,
}

impl CartReconciler {
    /// Create a reconciler with no active identity and an empty view.
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self {
            store,
            user_id: None,
            lines: Vec::new(),
        }
    }

    /// Identity whose cart is being shown, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<ProfileId> {
        self.user_id
    }

    /// Switch to another identity's cart, or to none.
    ///
    /// The view is emptied before anything is fetched, so one identity's
    /// lines are never shown under another.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if the reload fails; the view stays empty.
    pub async fn set_active_identity(&mut self, identity: Option<&Identity>) -> Result<&[CartLine]> {
        self.lines.clear();
        self.user_id = identity.map(|i| i.id);

        if self.user_id.is_none() {
            return Ok(&self.lines);
        }
        self.reload().await
    }

    /// Rebuild the view from the remote rows, newest first.
    ///
    /// Failures are reported to tracing and Sentry, then returned; the
    /// previous view is kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Backend` if a query fails or a row references a
    /// missing product.
    #[instrument(skip(self), fields(user_id = ?self.user_id))]
    pub async fn reload(&mut self) -> Result<&[CartLine]> {
        let Some(user_id) = self.user_id else {
            self.lines.clear();
            return Ok(&self.lines);
        };

        let today = Utc::now().date_naive();
        match CartRepository::new(self.store.as_ref()).lines(user_id, today).await {
            Ok(lines) => {
                debug!(lines = lines.len(), "Cart reloaded");
                self.lines = lines;
                Ok(&self.lines)
            }
            Err(e) => {
                let err = AppError::from(e);
                err.report();
                Err(err)
            }
        }
    }

    /// Add `quantity` of a product: increments the existing line or creates
    /// one, then reloads.
    ///
    /// Without an active identity this does nothing.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if `quantity` is below 1, or
    /// `AppError::Backend` if the write or the reload fails. A failed write
    /// skips the reload.
    #[instrument(skip(self), fields(user_id = ?self.user_id))]
    pub async fn add(&mut self, product_id: ProductId, quantity: i32) -> Result<()> {
        let Some(user_id) = self.user_id else {
            debug!("No active identity; ignoring add");
            return Ok(());
        };
        if quantity < 1 {
            return Err(AppError::Validation(format!(
                "quantity must be at least 1, got {quantity}"
            )));
        }

        let cart = CartRepository::new(self.store.as_ref());
        match cart.find(user_id, product_id).await? {
            Some(existing) => {
                let merged = existing.quantity.saturating_add(quantity);
                cart.set_quantity(existing.id, merged).await?;
            }
            None => {
                cart.insert(user_id, product_id, quantity).await?;
            }
        }

        let (product, added) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", product.as_str()), ("quantity", added.as_str())]),
        );
        self.reload().await?;
        Ok(())
    }

    /// Set a line's quantity, removing the line when `quantity <= 0`, then
    /// reload.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` without an active identity, or
    /// `AppError::Backend` if the write or the reload fails. A failed write
    /// skips the reload.
    #[instrument(skip(self), fields(user_id = ?self.user_id))]
    pub async fn set_quantity(&mut self, line_id: CartItemId, quantity: i32) -> Result<()> {
        if self.user_id.is_none() {
            return Err(AppError::Unauthorized("log in to change the cart".to_string()));
        }

        let cart = CartRepository::new(self.store.as_ref());
        let line = line_id.to_string();
        if quantity <= 0 {
            cart.delete(line_id).await?;
            add_breadcrumb("cart", "Removed from cart", Some(&[("line_id", line.as_str())]));
        } else {
            cart.set_quantity(line_id, quantity).await?;
            let quantity = quantity.to_string();
            add_breadcrumb(
                "cart",
                "Changed quantity",
                Some(&[("line_id", line.as_str()), ("quantity", quantity.as_str())]),
            );
        }

        self.reload().await?;
        Ok(())
    }

    /// Lines currently in view, newest first.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the view holds no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities across the view.
    #[must_use]
    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.quantity)).sum()
    }

    /// Total at today's (UTC) effective prices.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.total_price_on(Utc::now().date_naive())
    }

    /// Total at the effective prices on `date`.
    #[must_use]
    pub fn total_price_on(&self, date: NaiveDate) -> Price {
        self.lines.iter().map(|line| line.subtotal(date)).sum()
    }
}
