//! Tracing subscriber setup for the CLI.

use anyhow::Result;
use std::env::var;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Initialize the global subscriber.
///
/// Verbosity from `-v` flags sets the default directive; `RUST_LOG` still
/// wins when present. `AGORA_LOG_FORMAT=json` switches to JSON output.
///
/// # Errors
///
/// Returns an error if a global subscriber was already installed.
pub fn init(verbosity_level: Option<tracing::Level>) -> Result<()> {
    let env_filter = match verbosity_level {
        Some(level) => EnvFilter::builder()
            .with_default_directive(level.into())
            .from_env_lossy(),
        None => EnvFilter::builder().from_env_lossy(),
    };

    let json = matches!(var("AGORA_LOG_FORMAT"), Ok(format) if format == "json");
    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        let subscriber = Registry::default().with(fmt_layer).with(env_filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let fmt_layer = fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(false);
        let subscriber = Registry::default().with(fmt_layer).with(env_filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
