//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// SSE keep-alive interval (seconds).
pub const SSE_KEEP_ALIVE_SECS: u64 = 15;

// ============================================================================
// Playback
// ============================================================================

/// Real-time playback. `wait = simulated_duration / speed`, `0` = no wait.
pub const PLAYBACK_SPEED: f64 = 1.0;

/// Upper bound accepted for the speed multiplier before a warning is logged.
pub const PLAYBACK_SPEED_WARN_ABOVE: f64 = 100.0;

/// Broadcast capacity for playback events.
///
/// One step emits two events; 256 covers several concurrent surfaces before
/// a slow SSE client starts lagging.
pub const EVENT_BUFFER: usize = 256;

/// Finished surfaces kept for snapshot reads before the least recently
/// started one is evicted.
pub const FINISHED_SURFACE_LIMIT: usize = 64;

/// Surface name used by the CLI `play` command.
pub const CLI_SURFACE: &str = "terminal";

// ============================================================================
// Catalogs
// ============================================================================

/// Subject played when the CLI is given none.
pub const DEFAULT_SUBJECT: &str = "nda-demo";

// ============================================================================
// Config Discovery
// ============================================================================

/// Environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "BRIEFCAST_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "briefcast.toml";

/// Environment override for `[server] addr`.
pub const SERVER_ADDR_ENV: &str = "BRIEFCAST_SERVER_ADDR";
