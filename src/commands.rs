use std::fs;
use std::io::{self, BufRead, Write};

use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};
use ulid::Ulid;

use crate::agenda::{AgendaView, EMPTY_MESSAGE};
use crate::cli::{Commands, OutputFormat, ShellLine};
use crate::engine::{Engine, EngineError};
use crate::form::{MaintenanceForm, ReservationForm};
use crate::model::*;
use crate::observability::{COMMANDS_TOTAL, command_label};
use crate::store::Dataset;

#[derive(Debug)]
pub enum CommandError {
    Engine(EngineError),
    Io(io::Error),
    Json(serde_json::Error),
    Usage(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Engine(e) => write!(f, "{e}"),
            CommandError::Io(e) => write!(f, "I/O error: {e}"),
            CommandError::Json(e) => write!(f, "JSON error: {e}"),
            CommandError::Usage(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Engine(e) => Some(e),
            CommandError::Io(e) => Some(e),
            CommandError::Json(e) => Some(e),
            CommandError::Usage(_) => None,
        }
    }
}

impl From<EngineError> for CommandError {
    fn from(e: EngineError) -> Self {
        CommandError::Engine(e)
    }
}

impl From<UnknownVehicle> for CommandError {
    fn from(e: UnknownVehicle) -> Self {
        CommandError::Engine(EngineError::UnknownVehicle(e.0))
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}

/// Run one command against the session, writing its report to `out`.
pub fn execute(
    engine: &mut Engine,
    command: Commands,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    let label = command_label(&command);
    let result = dispatch(engine, command, format, out);
    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(COMMANDS_TOTAL, "command" => label, "status" => status).increment(1);
    result
}

fn dispatch(
    engine: &mut Engine,
    command: Commands,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<(), CommandError> {
    match command {
        Commands::Reserve {
            employee,
            vehicle,
            start_date,
            start_time,
            end_date,
            end_time,
            reason,
        } => {
            let request = ReservationForm {
                employee,
                vehicle,
                start_date: Some(start_date),
                start_time,
                end_date: Some(end_date),
                end_time,
                reason,
            }
            .into_request()?;
            let created = engine.create_reservation(request)?;
            match format {
                OutputFormat::Json => print_json(out, &created),
                OutputFormat::Table => {
                    writeln!(out, "Reserved {}: {}", created.id, created.summary())?;
                    Ok(())
                }
            }
        }

        Commands::Block {
            vehicle,
            start_date,
            start_time,
            end_date,
            end_time,
            reason,
        } => {
            let request = MaintenanceForm {
                vehicle,
                start_date,
                start_time,
                end_date,
                end_time,
                reason,
            }
            .into_request();
            let created = engine.create_maintenance_block(request)?;
            let affected: Vec<&Reservation> = engine
                .reservations_for(created.vehicle)
                .filter(|r| r.span.overlaps(&created.span))
                .collect();
            match format {
                OutputFormat::Json => print_json(out, &created),
                OutputFormat::Table => {
                    writeln!(
                        out,
                        "Blocked {} {}: {} - {}",
                        created.vehicle,
                        created.id,
                        created.span.start.format(SUMMARY_FORMAT),
                        created.span.end.format(SUMMARY_FORMAT)
                    )?;
                    for r in affected {
                        writeln!(out, "  overlaps reservation {}: {}", r.id, r.summary())?;
                    }
                    Ok(())
                }
            }
        }

        Commands::Cancel { selector } => {
            let removed = match Ulid::from_string(selector.trim()) {
                Ok(id) => engine.cancel_reservation(id)?,
                Err(_) => engine.cancel_reservation_by_summary(&selector)?,
            };
            match format {
                OutputFormat::Json => print_json(out, &removed),
                OutputFormat::Table => {
                    writeln!(out, "Cancelled {}: {}", removed.id, removed.summary())?;
                    Ok(())
                }
            }
        }

        Commands::Unblock { id } => {
            let removed = engine.remove_maintenance_block(id)?;
            match format {
                OutputFormat::Json => print_json(out, &removed),
                OutputFormat::Table => {
                    writeln!(out, "Removed maintenance block {} ({})", removed.id, removed.vehicle)?;
                    Ok(())
                }
            }
        }

        Commands::List { vehicle } => {
            let rows: Vec<&Reservation> = match vehicle {
                Some(v) => engine.reservations_for(v).collect(),
                None => engine.reservations().iter().collect(),
            };
            match format {
                OutputFormat::Json => print_json(out, &rows),
                OutputFormat::Table => {
                    if rows.is_empty() {
                        writeln!(out, "No reservations.")?;
                    }
                    for r in rows {
                        writeln!(
                            out,
                            "{}  {}  {}",
                            r.id,
                            r.summary(),
                            r.reason.as_deref().unwrap_or("")
                        )?;
                    }
                    Ok(())
                }
            }
        }

        Commands::Maintenance { vehicle } => {
            let rows: Vec<&MaintenanceBlock> = match vehicle {
                Some(v) => engine.maintenance_for(v).collect(),
                None => engine.maintenance_blocks().iter().collect(),
            };
            match format {
                OutputFormat::Json => print_json(out, &rows),
                OutputFormat::Table => {
                    if rows.is_empty() {
                        writeln!(out, "No maintenance blocks.")?;
                    }
                    for b in rows {
                        writeln!(
                            out,
                            "{}  {:<8} {} - {}  {}",
                            b.id,
                            b.vehicle,
                            b.span.start.format(SUMMARY_FORMAT),
                            b.span.end.format(SUMMARY_FORMAT),
                            b.reason.as_deref().unwrap_or("")
                        )?;
                    }
                    Ok(())
                }
            }
        }

        Commands::Agenda { json } => {
            let view = AgendaView::new(engine.agenda());
            if json || format == OutputFormat::Json {
                return print_json(out, &view);
            }
            if view.events.is_empty() {
                writeln!(out, "{EMPTY_MESSAGE}")?;
            }
            for e in &view.events {
                writeln!(
                    out,
                    "{} - {}  {:<24} {}",
                    e.start.format(SUMMARY_FORMAT),
                    e.end.format(SUMMARY_FORMAT),
                    e.title,
                    e.color
                )?;
            }
            Ok(())
        }

        Commands::Export { dataset, output } => {
            let dataset = Dataset::from(dataset);
            let bytes = engine.export(dataset)?;
            match output {
                Some(path) => {
                    let target = if path.is_dir() {
                        path.join(dataset.download_name())
                    } else {
                        path
                    };
                    fs::write(&target, &bytes)?;
                    info!(path = %target.display(), bytes = bytes.len(), "dataset exported");
                    writeln!(out, "Wrote {}", target.display())?;
                }
                None => out.write_all(&bytes)?,
            }
            Ok(())
        }

        Commands::Roster => {
            #[derive(Serialize)]
            struct VehicleEntry {
                name: Vehicle,
                color: &'static str,
            }
            #[derive(Serialize)]
            struct Roster {
                employees: &'static [&'static str],
                vehicles: Vec<VehicleEntry>,
            }
            let roster = Roster {
                employees: &EMPLOYEES,
                vehicles: Vehicle::ALL
                    .into_iter()
                    .map(|v| VehicleEntry {
                        name: v,
                        color: v.color(),
                    })
                    .collect(),
            };
            match format {
                OutputFormat::Json => print_json(out, &roster),
                OutputFormat::Table => {
                    writeln!(out, "Employees:")?;
                    for e in roster.employees {
                        writeln!(out, "  {e}")?;
                    }
                    writeln!(out, "Vehicles:")?;
                    for v in &roster.vehicles {
                        writeln!(out, "  {:<8} {}", v.name, v.color)?;
                    }
                    Ok(())
                }
            }
        }

        Commands::Reload => {
            engine.reload()?;
            writeln!(
                out,
                "Loaded {} reservations, {} maintenance blocks",
                engine.reservations().len(),
                engine.maintenance_blocks().len()
            )?;
            Ok(())
        }

        Commands::Shell => Err(CommandError::Usage("already in a shell".into())),
    }
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), CommandError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Read commands line by line until end of input or `exit`. Failures are
/// reported to `err` and the session continues.
pub fn run_shell(
    engine: &mut Engine,
    format: OutputFormat,
    input: impl BufRead,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let words = match shell_words::split(line) {
            Ok(words) => words,
            Err(e) => {
                writeln!(err, "Error: {e}")?;
                continue;
            }
        };
        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) => {
                write!(err, "{}", e.render())?;
                continue;
            }
        };
        debug!(command = command_label(&parsed.command), "shell command");
        if let Err(e) = execute(engine, parsed.command, format, out) {
            writeln!(err, "Error: {e}")?;
        }
        out.flush()?;
    }
    Ok(())
}

