//! Logging utilities for consistent tracing across the pipeline

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Initialize tracing subscriber with the default level
pub fn init_tracing() {
    init_tracing_with_level(None);
}

/// Initialize tracing subscriber with an explicit base level
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let base_level = log_level.unwrap_or("info");
    let filter = format!("engine={base_level},shared={base_level},reqwest=warn,hyper=warn");

    fmt()
        .with_env_filter(EnvFilter::new(&filter))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Contextual logging helper for run start messages
pub fn log_run_started(run_id: &uuid::Uuid, details: &str) {
    info!(
        run = %run_id,
        timestamp = format_timestamp(),
        "🚀 Starting run: {}",
        details
    );
}

/// Contextual logging helper for run completion messages
pub fn log_run_finished(run_id: &uuid::Uuid, status: &str) {
    info!(
        run = %run_id,
        timestamp = format_timestamp(),
        "✅ Run finished: {}",
        status
    );
}

/// Contextual logging helper for error conditions
pub fn log_run_error(run_id: &uuid::Uuid, context: &str, error: &dyn std::fmt::Display) {
    error!(
        run = %run_id,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}
