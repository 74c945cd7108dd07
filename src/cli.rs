//! Command-line definition using clap

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};

use crate::model::Vehicle;
use crate::store::Dataset;

/// Output format for results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Dataset named on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportTarget {
    Reservations,
    Maintenance,
}

impl From<ExportTarget> for Dataset {
    fn from(target: ExportTarget) -> Self {
        match target {
            ExportTarget::Reservations => Dataset::Reservations,
            ExportTarget::Maintenance => Dataset::Maintenance,
        }
    }
}

#[derive(Parser)]
#[command(name = "fleetbook")]
#[command(version)]
#[command(about = "Book company cars and block them for maintenance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the CSV datasets (overrides FLEETBOOK_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// One line typed into the interactive shell.
#[derive(Parser)]
#[command(name = "fleetbook", no_binary_name = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reserve a vehicle
    Reserve {
        /// Employee name from the roster
        #[arg(long, short = 'e')]
        employee: Option<String>,

        /// Micra, Sandero or Duster
        #[arg(long)]
        vehicle: Option<String>,

        /// YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,

        /// HH:MM
        #[arg(long, value_parser = parse_time)]
        start_time: Option<NaiveTime>,

        /// YYYY-MM-DD
        #[arg(long, value_parser = parse_date)]
        end_date: NaiveDate,

        /// HH:MM
        #[arg(long, value_parser = parse_time)]
        end_time: Option<NaiveTime>,

        #[arg(long, short = 'r')]
        reason: Option<String>,
    },

    /// Block a vehicle for maintenance
    Block {
        #[arg(long, value_parser = parse_vehicle)]
        vehicle: Vehicle,

        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,

        #[arg(long, value_parser = parse_time)]
        start_time: Option<NaiveTime>,

        #[arg(long, value_parser = parse_date)]
        end_date: NaiveDate,

        #[arg(long, value_parser = parse_time)]
        end_time: Option<NaiveTime>,

        #[arg(long, short = 'r')]
        reason: Option<String>,
    },

    /// Cancel a reservation by id or by its summary line
    Cancel {
        /// Reservation id, or the exact summary shown by `list`
        selector: String,
    },

    /// Remove a maintenance block
    Unblock {
        #[arg(value_parser = parse_ulid)]
        id: ulid::Ulid,
    },

    /// List reservations
    List {
        #[arg(long, value_parser = parse_vehicle)]
        vehicle: Option<Vehicle>,
    },

    /// List maintenance blocks
    Maintenance {
        #[arg(long, value_parser = parse_vehicle)]
        vehicle: Option<Vehicle>,
    },

    /// Show the agenda of reservations and maintenance
    Agenda {
        /// Emit calendar events and view options as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a dataset as CSV
    Export {
        #[arg(value_enum)]
        dataset: ExportTarget,

        /// Output file or directory (stdout if omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show employees and vehicles
    Roster,

    /// Re-read both datasets from disk
    Reload,

    /// Interactive session; one command per line
    Shell,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM: {e}"))
}

fn parse_vehicle(raw: &str) -> Result<Vehicle, String> {
    raw.parse().map_err(|e: crate::model::UnknownVehicle| e.to_string())
}

fn parse_ulid(raw: &str) -> Result<ulid::Ulid, String> {
    ulid::Ulid::from_string(raw.trim()).map_err(|e| e.to_string())
}
