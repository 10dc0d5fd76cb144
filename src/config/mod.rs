//! Application Configuration Module
//!
//! ## Loading Order
//!
//! 1. `BRIEFCAST_CONFIG` environment variable (path to TOML file)
//! 2. `briefcast.toml` in the current working directory
//! 3. Built-in defaults
//!
//! `BRIEFCAST_SERVER_ADDR` overrides `[server] addr` after loading.
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(AppConfig::load());
//! let speed = config::get().playback.speed;
//! ```

mod settings;
pub mod defaults;
pub mod validation;

pub use settings::*;

use std::sync::OnceLock;

/// Global application configuration, initialized once at startup.
static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Initialize the global configuration. Later calls are ignored.
pub fn init(config: AppConfig) {
    if APP_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global configuration, or the built-in defaults if `init()` has
/// not run (tests, library use).
pub fn get() -> &'static AppConfig {
    APP_CONFIG.get_or_init(AppConfig::default)
}
