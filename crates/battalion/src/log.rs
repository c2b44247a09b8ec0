//! Process-level logging setup.
//!
//! Installs a `tracing-subscriber` fmt layer writing to stderr. `RUST_LOG`
//! wins when set; otherwise the level requested by the first caller is used.
//! Only the first call in a process installs anything.

use once_cell::sync::OnceCell;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Installs the global subscriber once. Returns true if this call (or an
/// earlier one) installed it, false if another subscriber was already set.
pub fn enable_logging(level: Level) -> bool {
    *INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init()
            .is_ok()
    })
}
