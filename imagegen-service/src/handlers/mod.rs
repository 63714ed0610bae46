//! HTTP handlers for the image generation relay.

pub mod health;
pub mod images;
