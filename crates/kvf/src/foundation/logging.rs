//! Logging utilities
//!
//! The library only emits records through the `log` facade. Applications that do not bring
//! their own logger can call [`init`].

pub use log::{debug, error, info, trace, warn};

/// Initialize `env_logger` at `Info`, overridable through `RUST_LOG`
pub fn init() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
