use ulid::Ulid;

use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// A required selection or endpoint was not provided.
    IncompleteInput(&'static str),
    InvalidOrder,
    ReservationConflict(Ulid),
    MaintenanceConflict(Ulid),
    NotFound(String),
    AmbiguousSelector(usize),
    UnknownVehicle(String),
    Storage(StoreError),
}

impl EngineError {
    /// True for errors caused by the caller's input rather than by storage.
    pub fn is_validation(&self) -> bool {
        !matches!(self, EngineError::Storage(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::IncompleteInput(field) => write!(f, "incomplete input: missing {field}"),
            EngineError::InvalidOrder => write!(f, "start must be before end"),
            EngineError::ReservationConflict(id) => {
                write!(f, "conflicts with existing reservation {id} for this vehicle")
            }
            EngineError::MaintenanceConflict(id) => {
                write!(f, "vehicle is blocked for maintenance ({id}) in that window")
            }
            EngineError::NotFound(what) => write!(f, "not found: {what}"),
            EngineError::AmbiguousSelector(n) => {
                write!(f, "selector matches {n} reservations; cancel by id instead")
            }
            EngineError::UnknownVehicle(name) => write!(f, "unknown vehicle: {name:?}"),
            EngineError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Storage(e)
    }
}
