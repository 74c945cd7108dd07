use std::path::PathBuf;

/// Process settings, read from `FLEETBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub reservations_file: String,
    pub maintenance_file: String,
    pub allow_maintenance_override: bool,
    pub check_revision: bool,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            reservations_file: "reservas.csv".into(),
            maintenance_file: "mantenimiento.csv".into(),
            allow_maintenance_override: true,
            check_revision: true,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| parse_bool(&s))
                .unwrap_or(default)
        };
        Self {
            data_dir: lookup("FLEETBOOK_DATA_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            reservations_file: lookup("FLEETBOOK_RESERVATIONS_FILE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.reservations_file),
            maintenance_file: lookup("FLEETBOOK_MAINTENANCE_FILE")
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.maintenance_file),
            allow_maintenance_override: flag(
                "FLEETBOOK_ALLOW_MAINTENANCE_OVERRIDE",
                defaults.allow_maintenance_override,
            ),
            check_revision: flag("FLEETBOOK_CHECK_REVISION", defaults.check_revision),
            metrics_port: lookup("FLEETBOOK_METRICS_PORT").and_then(|s| s.parse().ok()),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
