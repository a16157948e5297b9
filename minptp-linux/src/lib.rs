pub mod clock;
pub mod config;
pub mod network;
pub mod observer;

use tracing::metadata::LevelFilter;

/// Build the subscriber writing the daemon's log to stdout
pub fn tracing_init(
    level: impl Into<LevelFilter>,
    ansi_colors: bool,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(ansi_colors)
        .finish()
}

/// Install the subscriber for the whole process, including the `log` records
/// of the protocol library
pub fn setup_logger(level: impl Into<LevelFilter>) -> Result<(), Box<dyn std::error::Error>> {
    tracing_log::LogTracer::init()?;
    tracing::subscriber::set_global_default(tracing_init(level, true))?;
    Ok(())
}
