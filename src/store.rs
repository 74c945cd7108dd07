use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use tracing::debug;

use crate::model::*;

pub const RESERVATION_COLUMNS: [&str; 5] = ["Empleado", "Vehículo", "Inicio", "Fin", "Motivo"];
pub const MAINTENANCE_COLUMNS: [&str; 4] = ["Vehículo", "Inicio", "Fin", "Motivo"];

/// Accepted on read, tried in order. Date-only values mean midnight.
const READ_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Csv(csv::Error),
    Row {
        path: PathBuf,
        line: u64,
        message: String,
    },
    /// The file changed on disk since this process last read or wrote it.
    StaleRevision { path: PathBuf },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Csv(e) => write!(f, "CSV error: {e}"),
            StoreError::Row {
                path,
                line,
                message,
            } => write!(f, "{}:{line}: {message}", path.display()),
            StoreError::StaleRevision { path } => write!(
                f,
                "{} was modified by another writer; reload and try again",
                path.display()
            ),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<csv::Error> for StoreError {
    fn from(e: csv::Error) -> Self {
        StoreError::Csv(e)
    }
}

/// What this process last saw of a dataset file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revision {
    /// Not read or written yet; saves are not checked.
    Unsynced,
    Absent,
    /// CRC-32 of the file bytes.
    Crc(u32),
}

impl Revision {
    fn of(bytes: Option<&[u8]>) -> Self {
        match bytes {
            Some(b) => Revision::Crc(crc32fast::hash(b)),
            None => Revision::Absent,
        }
    }
}

/// Which dataset an export refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Reservations,
    Maintenance,
}

impl Dataset {
    /// Suggested file name for a download of this dataset.
    pub fn download_name(self) -> &'static str {
        match self {
            Dataset::Reservations => "reservas_coches.csv",
            Dataset::Maintenance => "mantenimiento_coches.csv",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Dataset::Reservations => "reservations",
            Dataset::Maintenance => "maintenance",
        }
    }
}

/// Two CSV files, rewritten whole on every mutation.
///
/// There is no locking: one process is expected to write at a time. With the
/// revision check on, a save over a file that another process changed since
/// our last load or save is refused instead of silently losing its update.
pub struct CsvStore {
    reservations_path: PathBuf,
    maintenance_path: PathBuf,
    check_revision: bool,
    reservations_rev: Revision,
    maintenance_rev: Revision,
}

impl CsvStore {
    pub fn open(
        data_dir: &Path,
        reservations_file: &str,
        maintenance_file: &str,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            reservations_path: data_dir.join(reservations_file),
            maintenance_path: data_dir.join(maintenance_file),
            check_revision: true,
            reservations_rev: Revision::Unsynced,
            maintenance_rev: Revision::Unsynced,
        })
    }

    pub fn with_revision_check(mut self, enabled: bool) -> Self {
        self.check_revision = enabled;
        self
    }

    pub fn reservations_path(&self) -> &Path {
        &self.reservations_path
    }

    pub fn maintenance_path(&self) -> &Path {
        &self.maintenance_path
    }

    pub fn revision(&self, dataset: Dataset) -> Revision {
        match dataset {
            Dataset::Reservations => self.reservations_rev,
            Dataset::Maintenance => self.maintenance_rev,
        }
    }

    /// Read both datasets. A missing file is an empty dataset.
    pub fn load(&mut self) -> Result<(Vec<Reservation>, Vec<MaintenanceBlock>), StoreError> {
        let res_bytes = read_dataset(&self.reservations_path)?;
        let reservations = match &res_bytes {
            Some(b) => decode_reservations(b, &self.reservations_path)?,
            None => Vec::new(),
        };

        let mnt_bytes = read_dataset(&self.maintenance_path)?;
        let maintenance = match &mnt_bytes {
            Some(b) => decode_maintenance(b, &self.maintenance_path)?,
            None => Vec::new(),
        };

        self.reservations_rev = Revision::of(res_bytes.as_deref());
        self.maintenance_rev = Revision::of(mnt_bytes.as_deref());
        debug!(
            reservations = reservations.len(),
            maintenance = maintenance.len(),
            "datasets loaded"
        );
        Ok((reservations, maintenance))
    }

    pub fn save_reservations(&mut self, rows: &[Reservation]) -> Result<(), StoreError> {
        let bytes = encode_reservations(rows)?;
        self.reservations_rev = self.save(Dataset::Reservations, &bytes)?;
        Ok(())
    }

    pub fn save_maintenance(&mut self, rows: &[MaintenanceBlock]) -> Result<(), StoreError> {
        let bytes = encode_maintenance(rows)?;
        self.maintenance_rev = self.save(Dataset::Maintenance, &bytes)?;
        Ok(())
    }

    fn save(&self, dataset: Dataset, bytes: &[u8]) -> Result<Revision, StoreError> {
        let (path, expected) = match dataset {
            Dataset::Reservations => (&self.reservations_path, self.reservations_rev),
            Dataset::Maintenance => (&self.maintenance_path, self.maintenance_rev),
        };
        if self.check_revision && expected != Revision::Unsynced {
            let on_disk = read_dataset(path)?;
            if Revision::of(on_disk.as_deref()) != expected {
                return Err(StoreError::StaleRevision { path: path.clone() });
            }
        }

        let started = Instant::now();
        write_atomic(path, bytes)?;
        metrics::histogram!(
            crate::observability::STORE_SAVE_DURATION_SECONDS,
            "dataset" => dataset.label()
        )
        .record(started.elapsed().as_secs_f64());
        debug!(path = %path.display(), bytes = bytes.len(), "dataset saved");
        Ok(Revision::of(Some(bytes)))
    }
}

fn read_dataset(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write to a sibling temp file, fsync, then rename over the target. The temp
/// file does not outlive a failed attempt.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp_path = path.with_extension("csv.tmp");
    let result = write_synced(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    writer.get_ref().sync_all()
}

// ── Encoding ─────────────────────────────────────────────────────

fn format_ts(ts: &Ts) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, StoreError> {
    writer
        .into_inner()
        .map_err(|e| StoreError::Io(e.into_error()))
}

/// The reservations dataset as UTF-8 CSV, header row included.
pub fn encode_reservations(rows: &[Reservation]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RESERVATION_COLUMNS)?;
    for r in rows {
        let start = format_ts(&r.span.start);
        let end = format_ts(&r.span.end);
        writer.write_record([
            r.employee.as_str(),
            r.vehicle.as_str(),
            start.as_str(),
            end.as_str(),
            r.reason.as_deref().unwrap_or(""),
        ])?;
    }
    finish(writer)
}

/// The maintenance dataset as UTF-8 CSV, header row included.
pub fn encode_maintenance(rows: &[MaintenanceBlock]) -> Result<Vec<u8>, StoreError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(MAINTENANCE_COLUMNS)?;
    for b in rows {
        let start = format_ts(&b.span.start);
        let end = format_ts(&b.span.end);
        writer.write_record([
            b.vehicle.as_str(),
            start.as_str(),
            end.as_str(),
            b.reason.as_deref().unwrap_or(""),
        ])?;
    }
    finish(writer)
}

// ── Decoding ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReservationRow {
    #[serde(rename = "Empleado")]
    employee: String,
    #[serde(rename = "Vehículo")]
    vehicle: String,
    #[serde(rename = "Inicio")]
    start: String,
    #[serde(rename = "Fin")]
    end: String,
    #[serde(rename = "Motivo", default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaintenanceRow {
    #[serde(rename = "Vehículo")]
    vehicle: String,
    #[serde(rename = "Inicio")]
    start: String,
    #[serde(rename = "Fin")]
    end: String,
    #[serde(rename = "Motivo", default)]
    reason: Option<String>,
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<Ts> {
    let raw = raw.trim();
    READ_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_span(start: &str, end: &str) -> Result<Span, String> {
    let s = parse_timestamp(start).ok_or_else(|| format!("invalid start timestamp {start:?}"))?;
    let e = parse_timestamp(end).ok_or_else(|| format!("invalid end timestamp {end:?}"))?;
    Span::try_new(s, e).ok_or_else(|| format!("start {start:?} is not before end {end:?}"))
}

fn row_error(path: &Path, line: u64, message: impl Into<String>) -> StoreError {
    StoreError::Row {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

/// Iterate the data rows of a CSV payload, yielding each with its line number.
fn decode_rows<T, R>(
    bytes: &[u8],
    origin: &Path,
    mut convert: impl FnMut(T, u64) -> Result<R, StoreError>,
) -> Result<Vec<R>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new().from_reader(bytes);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map_or(0, |p| p.line());
        let row: T = record
            .deserialize(Some(&headers))
            .map_err(|e| row_error(origin, line, e.to_string()))?;
        rows.push(convert(row, line)?);
    }
    Ok(rows)
}

pub fn decode_reservations(bytes: &[u8], origin: &Path) -> Result<Vec<Reservation>, StoreError> {
    let mut rows = decode_rows(bytes, origin, |row: ReservationRow, line| {
        let employee = row.employee.trim();
        if employee.is_empty() {
            return Err(row_error(origin, line, "empty employee"));
        }
        let vehicle: Vehicle = row
            .vehicle
            .parse()
            .map_err(|e: UnknownVehicle| row_error(origin, line, e.to_string()))?;
        let span = parse_span(&row.start, &row.end).map_err(|m| row_error(origin, line, m))?;
        Ok(Reservation::new(
            employee.to_string(),
            vehicle,
            span,
            non_empty(row.reason),
        ))
    })?;
    assign_ids(&mut rows);
    Ok(rows)
}

pub fn decode_maintenance(
    bytes: &[u8],
    origin: &Path,
) -> Result<Vec<MaintenanceBlock>, StoreError> {
    let mut rows = decode_rows(bytes, origin, |row: MaintenanceRow, line| {
        let vehicle: Vehicle = row
            .vehicle
            .parse()
            .map_err(|e: UnknownVehicle| row_error(origin, line, e.to_string()))?;
        let span = parse_span(&row.start, &row.end).map_err(|m| row_error(origin, line, m))?;
        Ok(MaintenanceBlock::new(vehicle, span, non_empty(row.reason)))
    })?;
    assign_ids(&mut rows);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> Ts {
        parse_timestamp(raw).unwrap()
    }

    fn open(dir: &Path) -> CsvStore {
        CsvStore::open(dir, "reservas.csv", "mantenimiento.csv").unwrap()
    }

    fn sample_reservations() -> Vec<Reservation> {
        let mut rows = vec![
            Reservation::new(
                "Berta".into(),
                Vehicle::Micra,
                Span::new(ts("2024-01-01 09:00"), ts("2024-01-01 11:00")),
                Some("Visita, cliente".into()),
            ),
            Reservation::new(
                "Raúl".into(),
                Vehicle::Duster,
                Span::new(ts("2024-01-02 08:30"), ts("2024-01-02 14:00")),
                None,
            ),
        ];
        assign_ids(&mut rows);
        rows
    }

    #[test]
    fn timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-01-01 09:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T09:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T09:00"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-01-01 09:00 "), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-01"),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert!(parse_timestamp("2024-01-01T09:00:00.250").is_some());
        assert!(parse_timestamp("01/01/2024 09:00").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        let (r, m) = store.load().unwrap();
        assert!(r.is_empty());
        assert!(m.is_empty());
        assert_eq!(store.revision(Dataset::Reservations), Revision::Absent);
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.load().unwrap();

        let reservations = sample_reservations();
        let maintenance = vec![MaintenanceBlock::new(
            Vehicle::Duster,
            Span::new(ts("2024-02-01 08:00"), ts("2024-02-01 18:00")),
            Some("ITV".into()),
        )];
        store.save_reservations(&reservations).unwrap();
        store.save_maintenance(&maintenance).unwrap();

        let mut reopened = open(dir.path());
        let (r, m) = reopened.load().unwrap();
        assert_eq!(r, reservations);
        assert_eq!(m, maintenance);
    }

    #[test]
    fn written_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.save_reservations(&sample_reservations()).unwrap();
        let text = fs::read_to_string(store.reservations_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Empleado,Vehículo,Inicio,Fin,Motivo");
        assert_eq!(
            lines[1],
            "Berta,Micra,2024-01-01 09:00:00,2024-01-01 11:00:00,\"Visita, cliente\""
        );
        assert_eq!(lines[2], "Raúl,Duster,2024-01-02 08:30:00,2024-01-02 14:00:00,");
        assert!(!dir.path().join("reservas.csv.tmp").exists());
    }

    #[test]
    fn empty_dataset_still_has_header() {
        let bytes = encode_maintenance(&[]).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "Vehículo,Inicio,Fin,Motivo\n");
    }

    #[test]
    fn reads_files_written_by_the_booking_page() {
        // Column order differs and dates are date-only for midnight values.
        let csv = "Vehículo,Inicio,Fin,Motivo\nSandero,2024-03-01,2024-03-02,\nMicra,2024-03-05 07:00:00,2024-03-05 09:00:00,Aceite\n";
        let rows = decode_maintenance(csv.as_bytes(), Path::new("m.csv")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].vehicle, Vehicle::Sandero);
        assert_eq!(rows[0].span.start, ts("2024-03-01 00:00"));
        assert_eq!(rows[0].reason, None);
        assert_eq!(rows[1].reason.as_deref(), Some("Aceite"));
    }

    #[test]
    fn missing_reason_column_is_tolerated() {
        let csv = "Empleado,Vehículo,Inicio,Fin\nPedro,Micra,2024-01-01 09:00,2024-01-01 10:00\n";
        let rows = decode_reservations(csv.as_bytes(), Path::new("r.csv")).unwrap();
        assert_eq!(rows[0].reason, None);
    }

    #[test]
    fn malformed_rows_fail_the_load() {
        let path = Path::new("r.csv");
        let bad_ts = "Empleado,Vehículo,Inicio,Fin,Motivo\nPedro,Micra,mañana,2024-01-01 10:00,\n";
        match decode_reservations(bad_ts.as_bytes(), path) {
            Err(StoreError::Row { line, message, .. }) => {
                assert_eq!(line, 2);
                assert!(message.contains("start"));
            }
            other => panic!("expected row error, got {other:?}"),
        }

        let bad_vehicle = "Empleado,Vehículo,Inicio,Fin,Motivo\nPedro,Clio,2024-01-01 09:00,2024-01-01 10:00,\n";
        assert!(matches!(
            decode_reservations(bad_vehicle.as_bytes(), path),
            Err(StoreError::Row { .. })
        ));

        let reversed = "Empleado,Vehículo,Inicio,Fin,Motivo\nPedro,Micra,2024-01-01 10:00,2024-01-01 09:00,\n";
        assert!(matches!(
            decode_reservations(reversed.as_bytes(), path),
            Err(StoreError::Row { .. })
        ));

        let no_employee = "Empleado,Vehículo,Inicio,Fin,Motivo\n ,Micra,2024-01-01 09:00,2024-01-01 10:00,\n";
        assert!(matches!(
            decode_reservations(no_employee.as_bytes(), path),
            Err(StoreError::Row { .. })
        ));

        let short_row = "Empleado,Vehículo,Inicio,Fin,Motivo\nPedro,Micra\n";
        assert!(decode_reservations(short_row.as_bytes(), path).is_err());
    }

    #[test]
    fn load_failure_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("reservas.csv"),
            "Empleado,Vehículo,Inicio,Fin,Motivo\nPedro,Micra,x,y,\n",
        )
        .unwrap();
        let mut store = open(dir.path());
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("reservas.csv:2"));
    }

    #[test]
    fn stale_write_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut ours = open(dir.path());
        let mut theirs = open(dir.path());
        ours.load().unwrap();
        theirs.load().unwrap();

        theirs.save_reservations(&sample_reservations()).unwrap();
        let err = ours.save_reservations(&[]).unwrap_err();
        assert!(matches!(err, StoreError::StaleRevision { .. }));

        // After reloading we see their write and may save again.
        let (rows, _) = ours.load().unwrap();
        assert_eq!(rows.len(), 2);
        ours.save_reservations(&rows[..1]).unwrap();
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory in the target's place makes the rename fail.
        let blocker = dir.path().join("reservas.csv");
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        let mut store = open(dir.path()).with_revision_check(false);
        let err = store.save_reservations(&sample_reservations()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.path().join("reservas.csv.tmp").exists());
        assert!(blocker.join("keep").exists());
    }

    #[test]
    fn revision_check_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let mut ours = open(dir.path()).with_revision_check(false);
        let mut theirs = open(dir.path());
        ours.load().unwrap();
        theirs.load().unwrap();
        theirs.save_reservations(&sample_reservations()).unwrap();
        ours.save_reservations(&[]).unwrap();
    }

    #[test]
    fn consecutive_saves_track_own_revision() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = open(dir.path());
        store.load().unwrap();
        let rows = sample_reservations();
        store.save_reservations(&rows).unwrap();
        store.save_reservations(&rows[..1]).unwrap();
        store.save_reservations(&[]).unwrap();
        assert_eq!(
            store.revision(Dataset::Reservations),
            Revision::Crc(crc32fast::hash(&encode_reservations(&[]).unwrap()))
        );
    }
}
