pub mod config;
pub mod db;
pub mod logging;
pub mod medicines;
pub mod models;
pub mod reminders;
pub mod runtime;

use tokio::runtime::Handle;

use crate::config::ReminderSettings;
use crate::reminders::ReminderError;
use crate::runtime::ReminderRuntime;

/// Run the reminder daemon until Ctrl-C.
pub async fn run() -> Result<(), ReminderError> {
    let path = config::settings_path();
    let stored = config::read_settings(&path)?;
    logging::init(
        stored
            .as_ref()
            .map_or(config::default_log_filter(), ReminderSettings::log_filter),
    );
    let settings = config::resolve_settings(&path, stored);

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let mut runtime = ReminderRuntime::start(&settings, Handle::current())?;
    match runtime.wait_ready().await {
        Some(Err(e)) => tracing::warn!(error = %e, "Start-up re-arm failed"),
        Some(Ok(outcome)) => tracing::debug!(?outcome, "Start-up re-arm finished"),
        None => {}
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
    }

    runtime.shutdown();
    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}
