//! Tech store backend: product catalog, session carts and the REST API
//! serving them, plus a caching client for the API.

pub mod cart;
pub mod catalog;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod response;
pub mod session;
pub mod store;

#[cfg(test)]
mod test_helpers;
