use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Naive local timestamp. No time zones anywhere.
pub type Ts = NaiveDateTime;

/// Format used when writing timestamps to storage. The fraction is omitted when zero.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Format used in human-readable reservation summaries.
pub const SUMMARY_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Employees offered as selectable input.
pub const EMPLOYEES: [&str; 15] = [
    "Antonio José",
    "Antonio Miguel",
    "Berta",
    "Encar",
    "Felipe",
    "Jose David",
    "Juanjo",
    "Juanma Fdez.",
    "Juanma Pelegrín",
    "Justa",
    "Mari Huertas",
    "Mayca",
    "Miguel Ángel",
    "Pedro",
    "Raúl",
];

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Ts,
    pub end: Ts,
}

impl Span {
    pub fn new(start: Ts, end: Ts) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Checked constructor for untrusted endpoints.
    pub fn try_new(start: Ts, end: Ts) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ── Vehicles ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vehicle {
    Micra,
    Sandero,
    Duster,
}

impl Vehicle {
    pub const ALL: [Vehicle; 3] = [Vehicle::Micra, Vehicle::Sandero, Vehicle::Duster];

    pub fn as_str(self) -> &'static str {
        match self {
            Vehicle::Micra => "Micra",
            Vehicle::Sandero => "Sandero",
            Vehicle::Duster => "Duster",
        }
    }

    /// Calendar color for this vehicle's reservations.
    pub fn color(self) -> &'static str {
        match self {
            Vehicle::Micra => "#1f77b4",
            Vehicle::Sandero => "#2ca02c",
            Vehicle::Duster => "#ff7f0e",
        }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVehicle(pub String);

impl fmt::Display for UnknownVehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown vehicle: {:?}", self.0)
    }
}

impl std::error::Error for UnknownVehicle {}

impl FromStr for Vehicle {
    type Err = UnknownVehicle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Vehicle::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVehicle(s.to_string()))
    }
}

// ── Records ──────────────────────────────────────────────────────

/// A booking of one vehicle by one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: Ulid,
    pub employee: String,
    pub vehicle: Vehicle,
    pub span: Span,
    pub reason: Option<String>,
}

impl Reservation {
    pub fn new(employee: String, vehicle: Vehicle, span: Span, reason: Option<String>) -> Self {
        let mut r = Self {
            id: Ulid::nil(),
            employee,
            vehicle,
            span,
            reason,
        };
        r.id = derive_id(Self::TAG, &r.content_key(), span.start, 0);
        r
    }

    /// `"<employee> - <vehicle> (<start> - <end>)"`, the legacy cancel selector.
    pub fn summary(&self) -> String {
        format!(
            "{} - {} ({} - {})",
            self.employee,
            self.vehicle,
            self.span.start.format(SUMMARY_FORMAT),
            self.span.end.format(SUMMARY_FORMAT)
        )
    }
}

/// A window during which a vehicle cannot be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaintenanceBlock {
    pub id: Ulid,
    pub vehicle: Vehicle,
    pub span: Span,
    pub reason: Option<String>,
}

impl MaintenanceBlock {
    pub fn new(vehicle: Vehicle, span: Span, reason: Option<String>) -> Self {
        let mut b = Self {
            id: Ulid::nil(),
            vehicle,
            span,
            reason,
        };
        b.id = derive_id(Self::TAG, &b.content_key(), span.start, 0);
        b
    }
}

/// Blank free text counts as no text.
pub fn non_empty(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

// ── Identity ─────────────────────────────────────────────────────

/// A stored row whose id is derived from its content.
pub(crate) trait Record {
    const TAG: u8;
    fn content_key(&self) -> String;
    fn start(&self) -> Ts;
    fn id(&self) -> Ulid;
    fn set_id(&mut self, id: Ulid);
}

impl Record for Reservation {
    const TAG: u8 = b'R';

    fn content_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.employee,
            self.vehicle,
            self.span.start.format(TIMESTAMP_FORMAT),
            self.span.end.format(TIMESTAMP_FORMAT),
            self.reason.as_deref().unwrap_or("")
        )
    }

    fn start(&self) -> Ts {
        self.span.start
    }

    fn id(&self) -> Ulid {
        self.id
    }

    fn set_id(&mut self, id: Ulid) {
        self.id = id;
    }
}

impl Record for MaintenanceBlock {
    const TAG: u8 = b'M';

    fn content_key(&self) -> String {
        format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.vehicle,
            self.span.start.format(TIMESTAMP_FORMAT),
            self.span.end.format(TIMESTAMP_FORMAT),
            self.reason.as_deref().unwrap_or("")
        )
    }

    fn start(&self) -> Ts {
        self.span.start
    }

    fn id(&self) -> Ulid {
        self.id
    }

    fn set_id(&mut self, id: Ulid) {
        self.id = id;
    }
}

/// ULID layout: start time in the timestamp bits; tag, content CRC and
/// occurrence ordinal in the random bits.
fn derive_id(tag: u8, key: &str, start: Ts, ordinal: u32) -> Ulid {
    let ms = start.and_utc().timestamp_millis().max(0) as u64;
    let crc = crc32fast::hash(key.as_bytes());
    let random = ((tag as u128) << 72) | ((crc as u128) << 32) | ordinal as u128;
    Ulid::from_parts(ms, random)
}

/// Derive the ids of a freshly loaded dataset. Identical rows are told apart
/// by their order of occurrence, so the same file always yields the same ids.
pub(crate) fn assign_ids<R: Record>(rows: &mut [R]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for row in rows.iter_mut() {
        let key = row.content_key();
        let ordinal = seen.entry(key.clone()).or_insert(0);
        let id = derive_id(R::TAG, &key, row.start(), *ordinal);
        *ordinal += 1;
        row.set_id(id);
    }
}

/// Id for a row about to join `existing`: the lowest ordinal for its content
/// not already taken. Ids of rows already in `existing` never change.
pub(crate) fn fresh_id<R: Record>(existing: &[R], row: &R) -> Ulid {
    let key = row.content_key();
    let mut ordinal = 0;
    loop {
        let id = derive_id(R::TAG, &key, row.start(), ordinal);
        if existing.iter().all(|r| r.id() != id) {
            return id;
        }
        ordinal += 1;
    }
}

// ── Requests ─────────────────────────────────────────────────────

/// Candidate reservation as collected by a front end. `None` means "not chosen".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationRequest {
    pub employee: Option<String>,
    pub vehicle: Option<Vehicle>,
    pub start: Option<Ts>,
    pub end: Option<Ts>,
    pub reason: Option<String>,
}

/// Candidate maintenance block. The vehicle is always chosen from the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintenanceRequest {
    pub vehicle: Vehicle,
    pub start: Option<Ts>,
    pub end: Option<Ts>,
    pub reason: Option<String>,
}
