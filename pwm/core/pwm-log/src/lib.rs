//! # Stderr Logging
//!
//! A tiny `log::Log` backend for the daemon. Records are written to standard
//! error as single lines:
//!
//! ```text
//! [INFO] pwm_engine::engine: DMA running on channel 14
//! ```
//!
//! ## `enabled` Feature (default)
//!
//! When disabled, [`stderr_trace!`] expands to nothing and the logger drops
//! every record, so release builds for headless boards can ship silent.
//!
//! ## Usage
//! ```rust,no_run
//! use log::{LevelFilter, info};
//! use pwm_log::StderrLogger;
//!
//! StderrLogger::new(LevelFilter::Debug).init().expect("logger initialization");
//! info!("ready");
//! ```

mod logger;

pub use logger::StderrLogger;

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod stderr_fmt {
    use std::fmt;
    use std::io::Write;

    /// Write one formatted line while holding the stderr lock.
    pub fn write_line(args: fmt::Arguments<'_>) {
        let mut out = std::io::stderr().lock();
        // Best effort: a closed stderr must not take the daemon down.
        let _ = out.write_fmt(args);
        let _ = out.write_all(b"\n");
    }
}

/// Write a formatted line to stderr, bypassing the log facade.
#[cfg(feature = "enabled")]
#[macro_export]
macro_rules! stderr_trace {
    ($($arg:tt)*) => {
        $crate::stderr_fmt::write_line(format_args!($($arg)*))
    };
}

#[cfg(not(feature = "enabled"))]
#[macro_export]
macro_rules! stderr_trace {
    ($($arg:tt)*) => {{}};
}
