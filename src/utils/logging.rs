//! Diagnostic logging helpers.
//!
//! These go to the `log` facade (and from there to `env_logger`), not to the
//! user-facing [`EventLog`](crate::event_log::EventLog). Modules opt in by
//! declaring a flag before using the macros:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_debug, log_info, log_warn};
//!
//! log_info!("run {} entered recognizing", run_id);
//! ```

/// Info-level diagnostic, emitted only when the calling module's
/// `ENABLE_LOGS` const is true.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

/// Warn-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level counterpart of [`log_info!`].
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}

/// Debug-level counterpart of [`log_info!`]. Used for chatty pipeline traces
/// such as stale recognition responses and history evictions.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

/// Initializes `env_logger` from `RUST_LOG`, defaulting to `Info`.
///
/// `TEXSNAP_DEBUG=1` (or `true`) raises the default to `Debug`. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging() {
    let debug_mode = std::env::var("TEXSNAP_DEBUG")
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let default_level = if debug_mode {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .try_init();
}
