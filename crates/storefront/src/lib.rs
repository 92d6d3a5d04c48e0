//! Community Mart storefront library.
//!
//! Identity, cart, catalog, address and order logic over the hosted data
//! API. The `mart` binary in `community-mart-cli` is a thin shell around
//! [`state::AppState`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;
