//! service-core: Shared infrastructure for the image generation relay.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod utils;

