pub mod api_key;

pub use api_key::{API_KEY_HEADER, require_api_key};
