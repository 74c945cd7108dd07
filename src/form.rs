//! Turns front-end selections into engine requests.
//!
//! Select boxes offer [`UNSET`] as their first entry; it never reaches the
//! engine, which only sees `None`.

use chrono::{NaiveDate, NaiveTime};

use crate::model::*;

/// Placeholder entry meaning "nothing chosen".
pub const UNSET: &str = "Seleccionar";

/// The chosen entry of a select box, or `None` for the placeholder or blank.
pub fn selection(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty() && *s != UNSET)
}

/// Vehicle select box. The placeholder is `Ok(None)`; an unknown name is an error.
pub fn vehicle_selection(raw: Option<&str>) -> Result<Option<Vehicle>, UnknownVehicle> {
    selection(raw).map(str::parse::<Vehicle>).transpose()
}

/// Join a date input and an optional time input into one timestamp.
/// Without a time there is no timestamp.
pub fn combine(date: NaiveDate, time: Option<NaiveTime>) -> Option<Ts> {
    time.map(|t| date.and_time(t))
}

/// Raw values of the reservation form.
#[derive(Debug, Clone, Default)]
pub struct ReservationForm {
    pub employee: Option<String>,
    pub vehicle: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl ReservationForm {
    pub fn into_request(self) -> Result<ReservationRequest, UnknownVehicle> {
        Ok(ReservationRequest {
            employee: selection(self.employee.as_deref()).map(str::to_string),
            vehicle: vehicle_selection(self.vehicle.as_deref())?,
            start: self.start_date.and_then(|d| combine(d, self.start_time)),
            end: self.end_date.and_then(|d| combine(d, self.end_time)),
            reason: non_empty(self.reason),
        })
    }
}

/// Raw values of the maintenance form.
#[derive(Debug, Clone)]
pub struct MaintenanceForm {
    pub vehicle: Vehicle,
    pub start_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_date: NaiveDate,
    pub end_time: Option<NaiveTime>,
    pub reason: Option<String>,
}

impl MaintenanceForm {
    pub fn into_request(self) -> MaintenanceRequest {
        MaintenanceRequest {
            vehicle: self.vehicle,
            start: combine(self.start_date, self.start_time),
            end: combine(self.end_date, self.end_time),
            reason: non_empty(self.reason),
        }
    }
}
