use serde::Serialize;

use crate::model::*;

pub const MAINTENANCE_COLOR: &str = "#808080";

/// Shown instead of a calendar when there is nothing to render.
pub const EMPTY_MESSAGE: &str = "No hay registros para mostrar.";

/// One calendar entry. `start`/`end` serialize as ISO-8601.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgendaEvent {
    pub title: String,
    pub start: Ts,
    pub end: Ts,
    pub color: &'static str,
}

/// Week view options for the calendar widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarOptions {
    pub initial_view: &'static str,
    pub locale: &'static str,
    pub slot_min_time: &'static str,
    pub slot_max_time: &'static str,
    pub height: u32,
}

impl Default for CalendarOptions {
    fn default() -> Self {
        Self {
            initial_view: "timeGridWeek",
            locale: "es",
            slot_min_time: "07:00:00",
            slot_max_time: "21:00:00",
            height: 600,
        }
    }
}

/// What a calendar front end needs to draw the agenda.
#[derive(Debug, Clone, Serialize)]
pub struct AgendaView {
    pub events: Vec<AgendaEvent>,
    pub options: CalendarOptions,
}

impl AgendaView {
    pub fn new(events: Vec<AgendaEvent>) -> Self {
        Self {
            events,
            options: CalendarOptions::default(),
        }
    }
}

/// Reservations first, then maintenance blocks, each in insertion order.
pub fn to_events(reservations: &[Reservation], maintenance: &[MaintenanceBlock]) -> Vec<AgendaEvent> {
    let booked = reservations.iter().map(|r| AgendaEvent {
        title: format!("{} - {}", r.vehicle, r.employee),
        start: r.span.start,
        end: r.span.end,
        color: r.vehicle.color(),
    });
    let blocked = maintenance.iter().map(|b| AgendaEvent {
        title: format!("Mantenimiento - {}", b.vehicle),
        start: b.span.start,
        end: b.span.end,
        color: MAINTENANCE_COLOR,
    });
    booked.chain(blocked).collect()
}
