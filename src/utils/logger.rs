use chrono::Local;
use eyre::Result;
use fern::Dispatch;

/// Sets up console logging for the engine.
///
/// The level comes from `RUST_LOG` (default `Info`); each line carries a
/// local timestamp, the level, and the module that logged it.
///
/// # Errors
/// * If the logger is applied twice
pub fn setup_logger() -> Result<()> {
    Dispatch::new()
        .level(
            std::env::var("RUST_LOG")
                .map(|level| level.parse().unwrap_or(log::LevelFilter::Info))
                .unwrap_or(log::LevelFilter::Info),
        )
        .chain(std::io::stdout())
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ));
        })
        .apply()?;
    Ok(())
}
