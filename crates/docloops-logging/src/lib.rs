//! # docloops-logging
//!
//! Logging for the docloops correction loop.
//!
//! Two layers: `tracing` diagnostics set up by [`init_tracing`], and the
//! loop's own event stream ([`LogEvent`]) written by a [`Logger`] to
//! stderr and optionally to a JSON-lines file.
//!
//! ## Log Formats
//!
//! - `Pretty` - colored, human-readable
//! - `Json` - one JSON object per event
//! - `Compact` - one short line per event

mod events;

pub use events::{LogEvent, LogFormat, Logger, Stage};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing for the application.
///
/// `RUST_LOG` overrides `level`. Diagnostics go to stderr.
pub fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Pretty | LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .init();
        }
    }
}
