use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// What a candidate interval collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Reservation,
    Maintenance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// Id of the first overlapping record found.
    pub id: Ulid,
}

impl From<Conflict> for EngineError {
    fn from(c: Conflict) -> Self {
        match c.kind {
            ConflictKind::Reservation => EngineError::ReservationConflict(c.id),
            ConflictKind::Maintenance => EngineError::MaintenanceConflict(c.id),
        }
    }
}

/// First reservation on `vehicle` overlapping `candidate`, if any.
pub fn find_reservation_overlap(
    candidate: &Span,
    vehicle: Vehicle,
    reservations: &[Reservation],
) -> Option<Ulid> {
    reservations
        .iter()
        .find(|r| r.vehicle == vehicle && r.span.overlaps(candidate))
        .map(|r| r.id)
}

fn find_maintenance_overlap(
    candidate: &Span,
    vehicle: Vehicle,
    maintenance: &[MaintenanceBlock],
) -> Option<Ulid> {
    maintenance
        .iter()
        .find(|b| b.vehicle == vehicle && b.span.overlaps(candidate))
        .map(|b| b.id)
}

/// Whether `candidate` on `vehicle` collides with anything stored.
///
/// Reservations are checked before maintenance blocks, so when both overlap the
/// reservation is reported. Touching endpoints never conflict.
pub fn has_conflict(
    candidate: &Span,
    vehicle: Vehicle,
    reservations: &[Reservation],
    maintenance: &[MaintenanceBlock],
) -> Option<Conflict> {
    if let Some(id) = find_reservation_overlap(candidate, vehicle, reservations) {
        return Some(Conflict {
            kind: ConflictKind::Reservation,
            id,
        });
    }
    find_maintenance_overlap(candidate, vehicle, maintenance).map(|id| Conflict {
        kind: ConflictKind::Maintenance,
        id,
    })
}

pub(crate) fn check_no_conflict(
    candidate: &Span,
    vehicle: Vehicle,
    reservations: &[Reservation],
    maintenance: &[MaintenanceBlock],
) -> Result<(), EngineError> {
    match has_conflict(candidate, vehicle, reservations, maintenance) {
        Some(conflict) => Err(conflict.into()),
        None => Ok(()),
    }
}

/// Completeness then ordering, in that order.
pub(crate) fn validate_endpoints(start: Option<Ts>, end: Option<Ts>) -> Result<Span, EngineError> {
    let start = start.ok_or(EngineError::IncompleteInput("start"))?;
    let end = end.ok_or(EngineError::IncompleteInput("end"))?;
    Span::try_new(start, end).ok_or(EngineError::InvalidOrder)
}
