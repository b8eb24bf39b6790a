//! Logging macros gated on a module-level `ENABLE_LOGS` flag.
//!
//! The control loop and the channel supervisor log on every message; a
//! module can silence itself without touching `RUST_LOG` by flipping its
//! flag:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//! use crate::{log_debug, log_info};
//! ```

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Error-level variant. Errors that are also surfaced to the caller are
/// still logged here so the supervisor's history stays complete.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
