//! Domain models for the storefront.
//!
//! Row types mirror the data API tables and deserialize straight from the
//! JSON rows returned by [`crate::store::DataStore`]. Composite types
//! ([`CartLine`], [`OrderDetails`], [`PromotionListing`]) are assembled
//! client-side by the repositories in [`crate::db`].

pub mod address;
pub mod cart;
pub mod catalog;
pub mod identity;
pub mod order;

pub use address::{Address, NewAddress};
pub use cart::{CartItemRow, CartLine};
pub use catalog::{Category, Product, ProductSnapshot, Promotion, PromotionListing};
pub use identity::Identity;
pub use order::{NewOrderItem, Order, OrderDetails, OrderFilter, OrderItem};
