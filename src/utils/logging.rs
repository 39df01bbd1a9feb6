//! Conditional logging macros gated on a module-level `ENABLE_LOGS` const.
//!
//! Each module that uses them declares its own flag:
//! ```rust
//! const ENABLE_LOGS: bool = true;
//! ```
//! and imports the macros from the crate root:
//! ```rust,ignore
//! use crate::{log_info, log_warn, log_error};
//! ```

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

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
