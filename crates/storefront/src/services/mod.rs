//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `identity` - Phone-number login and session restore
//! - `cart` - Local cart view reconciled against the remote rows
//! - `catalog` - Categories, products and today's promotions
//! - `checkout` - Turning the cart view into an order
//! - `session_cache` - Durable local storage for the session

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod identity;
pub mod session_cache;

pub use cart::CartReconciler;
pub use catalog::CatalogService;
pub use checkout::Checkout;
pub use identity::{IDENTITY_KEY, IdentityResolver};
pub use session_cache::{FileSessionCache, MemorySessionCache, SessionCache, SessionCacheError};
