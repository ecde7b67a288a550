//! log_msg!() macro
//! ---
//!
//! Deployment steps narrate what they do through `log_msg!()`. Messages go to
//! `tracing` at `INFO` level, so any subscriber installed by the binary picks
//! them up, and tests stay silent unless they install one themselves.
//!
//! Use `tracing::debug!()` directly when the message carries structured fields
//! (addresses, transaction hashes) that are worth filtering on.
//!

pub use tracing;

use tracing_subscriber::{fmt, EnvFilter};

#[macro_export]
macro_rules! log_msg {
    ($fmt:literal $(, $args:expr)* $(,)?) => {
        $crate::log::tracing::info!($fmt $(, $args)*);
    };
}

/// Install the fmt subscriber used by binaries.
///
/// Honours `RUST_LOG`, falling back to `info`. Calling it twice is harmless,
/// the second installation is ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
