//! `mart` subcommands.
//!
//! Each command prints its result to stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod session;
