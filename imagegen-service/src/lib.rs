//! Image generation relay: authenticates a prompt, runs it through a hosted
//! LoRA model with fixed settings and returns the resulting image URLs.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application, build_router};
