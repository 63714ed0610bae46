pub mod secrets;

pub use secrets::{keys_match, secret_prefix, truncate_for_log};
