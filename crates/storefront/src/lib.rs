//! Tillpoint Storefront library.
//!
//! The cart page, its coupon and checkout collaborators, and the HTTP layer
//! that serves them. Exposed as a library so the integration tests can
//! build the same router the binary serves.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carts;
pub mod catalog;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod page;
pub mod routes;
pub mod services;
pub mod state;
