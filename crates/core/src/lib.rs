//! Community Mart Core - Shared types library.
//!
//! This crate provides common types used across all Community Mart components:
//! - `storefront` - Cart, identity, catalog and order logic over the hosted data API
//! - `cli` - Command-line shopping client
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, phone numbers, prices, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
