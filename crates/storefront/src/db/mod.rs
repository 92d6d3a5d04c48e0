//! Repositories over the hosted data API.
//!
//! The data API is the source of truth for everything: profiles, catalog,
//! carts, addresses and orders. Repositories borrow a [`DataStore`] and turn
//! rows into models.
//!
//! # Tables
//!
//! - `profiles` - User identities keyed by phone number
//! - `categories`, `products`, `promotions` - Read-only catalog
//! - `cart_items` - One row per (user, product) cart line
//! - `addresses` - Saved shipping addresses
//! - `orders`, `order_items` - Write-once order snapshots
//!
//! # Joins
//!
//! Joins are composed client-side: a listing fetches its base rows, then
//! the referenced rows with a single `in.(...)` query per table, and stitches
//! them together. A cart line whose product has disappeared is reported as
//! `BackendError::UnexpectedShape`; an order whose address has disappeared
//! keeps `address: None`.
//!
//! [`DataStore`]: crate::store::DataStore

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod profiles;

pub use addresses::AddressRepository;
pub use cart::CartRepository;
pub use catalog::CatalogRepository;
pub use orders::OrderRepository;
pub use profiles::ProfileRepository;

use std::collections::HashSet;
use std::hash::Hash;

/// Distinct values of `key` across `items`, in first-seen order.
pub(crate) fn distinct<T, K, F>(items: &[T], key: F) -> Vec<K>
where
    K: Copy + Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::new();
    items
        .iter()
        .map(key)
        .filter(|k| seen.insert(*k))
        .collect()
}
