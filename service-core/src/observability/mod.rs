pub mod logging;

pub use logging::{LogGuard, LogSettings, init_tracing};
