use ulid::Ulid;

use crate::agenda::{self, AgendaEvent};
use crate::model::*;
use crate::store::{self, Dataset};

use super::conflict::has_conflict;
use super::{Conflict, Engine, EngineError};

impl Engine {
    /// All reservations in insertion order.
    pub fn reservations(&self) -> &[Reservation] {
        &self.reservations
    }

    /// All maintenance blocks in insertion order.
    pub fn maintenance_blocks(&self) -> &[MaintenanceBlock] {
        &self.maintenance
    }

    pub fn reservation(&self, id: Ulid) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    pub fn maintenance_block(&self, id: Ulid) -> Option<&MaintenanceBlock> {
        self.maintenance.iter().find(|b| b.id == id)
    }

    pub fn reservations_for(&self, vehicle: Vehicle) -> impl Iterator<Item = &Reservation> {
        self.reservations.iter().filter(move |r| r.vehicle == vehicle)
    }

    pub fn maintenance_for(&self, vehicle: Vehicle) -> impl Iterator<Item = &MaintenanceBlock> {
        self.maintenance.iter().filter(move |b| b.vehicle == vehicle)
    }

    /// Rendered summaries, one per reservation, as offered to the cancel selector.
    pub fn summaries(&self) -> Vec<String> {
        self.reservations.iter().map(Reservation::summary).collect()
    }

    /// Whether a reservation for `vehicle` over `span` would be accepted now.
    pub fn check(&self, span: &Span, vehicle: Vehicle) -> Option<Conflict> {
        has_conflict(span, vehicle, &self.reservations, &self.maintenance)
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty() && self.maintenance.is_empty()
    }

    pub fn agenda(&self) -> Vec<AgendaEvent> {
        agenda::to_events(&self.reservations, &self.maintenance)
    }

    /// Full current contents of a dataset as UTF-8 CSV.
    pub fn export(&self, dataset: Dataset) -> Result<Vec<u8>, EngineError> {
        let bytes = match dataset {
            Dataset::Reservations => store::encode_reservations(&self.reservations)?,
            Dataset::Maintenance => store::encode_maintenance(&self.maintenance)?,
        };
        Ok(bytes)
    }
}
