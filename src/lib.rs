// Library entry point for rapport
// Exposes modules for the binary and for testing

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod models;
pub mod query;
pub mod store;
