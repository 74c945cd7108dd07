use std::net::SocketAddr;

use crate::cli::Commands;
use crate::engine::EngineError;

// ── Lifecycle metrics ───────────────────────────────────────────

/// Counter: reservations created.
pub const RESERVATIONS_CREATED_TOTAL: &str = "fleetbook_reservations_created_total";

/// Counter: reservation attempts rejected. Labels: reason.
pub const RESERVATIONS_REJECTED_TOTAL: &str = "fleetbook_reservations_rejected_total";

/// Counter: reservations cancelled.
pub const RESERVATIONS_CANCELLED_TOTAL: &str = "fleetbook_reservations_cancelled_total";

/// Counter: maintenance blocks created.
pub const MAINTENANCE_CREATED_TOTAL: &str = "fleetbook_maintenance_created_total";

/// Counter: maintenance block attempts rejected. Labels: reason.
pub const MAINTENANCE_REJECTED_TOTAL: &str = "fleetbook_maintenance_rejected_total";

/// Counter: maintenance blocks removed.
pub const MAINTENANCE_REMOVED_TOTAL: &str = "fleetbook_maintenance_removed_total";

// ── Storage and front end ───────────────────────────────────────

/// Histogram: dataset save latency in seconds. Labels: dataset.
pub const STORE_SAVE_DURATION_SECONDS: &str = "fleetbook_store_save_duration_seconds";

/// Counter: commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "fleetbook_commands_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for why an operation was rejected.
pub fn rejection_label(err: &EngineError) -> &'static str {
    match err {
        EngineError::IncompleteInput(_) => "incomplete_input",
        EngineError::InvalidOrder => "invalid_order",
        EngineError::ReservationConflict(_) => "reservation_conflict",
        EngineError::MaintenanceConflict(_) => "maintenance_conflict",
        EngineError::NotFound(_) => "not_found",
        EngineError::AmbiguousSelector(_) => "ambiguous_selector",
        EngineError::UnknownVehicle(_) => "unknown_vehicle",
        EngineError::Storage(_) => "storage",
    }
}

/// Map a command to a short label for metrics.
pub fn command_label(cmd: &Commands) -> &'static str {
    match cmd {
        Commands::Reserve { .. } => "reserve",
        Commands::Block { .. } => "block",
        Commands::Cancel { .. } => "cancel",
        Commands::Unblock { .. } => "unblock",
        Commands::List { .. } => "list",
        Commands::Maintenance { .. } => "maintenance",
        Commands::Agenda { .. } => "agenda",
        Commands::Export { .. } => "export",
        Commands::Roster => "roster",
        Commands::Reload => "reload",
        Commands::Shell => "shell",
    }
}
