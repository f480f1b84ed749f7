pub mod config;
pub mod models;
pub mod db;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

use pipeline::{build_orchestrator, ProcessingError, RunState};

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Process one document with settings from the environment and the bundled
/// local collaborators. Results go to `LOANSCAN_DB_PATH`, or the app data
/// directory when unset.
pub fn run(document_id: &str) -> Result<RunState, ProcessingError> {
    let mut settings = config::Settings::from_env()?;
    settings
        .storage
        .database_path
        .get_or_insert_with(config::default_database_path);
    tracing::info!(
        "{} starting v{} ({})",
        config::APP_NAME,
        config::APP_VERSION,
        settings.environment
    );

    let orchestrator = build_orchestrator(&settings)?;
    Ok(orchestrator.run(document_id))
}
