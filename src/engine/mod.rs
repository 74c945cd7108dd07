mod conflict;
mod error;
mod mutations;
mod queries;

pub use conflict::{Conflict, ConflictKind, find_reservation_overlap, has_conflict};
pub use error::EngineError;

use tracing::info;

use crate::model::*;
use crate::store::CsvStore;

/// Lifecycle rules that are a matter of site policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Maintenance blocks may be placed over confirmed reservations.
    /// Affected reservations stay on file and must be cancelled by hand.
    pub allow_maintenance_override: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            allow_maintenance_override: true,
        }
    }
}

/// The booking session: both datasets in memory plus the store that owns
/// their files. Every mutation persists the whole candidate dataset before it
/// replaces the in-memory copy, so a failed save changes nothing.
pub struct Engine {
    store: CsvStore,
    policy: Policy,
    reservations: Vec<Reservation>,
    maintenance: Vec<MaintenanceBlock>,
}

impl Engine {
    pub fn open(mut store: CsvStore, policy: Policy) -> Result<Self, EngineError> {
        let (reservations, maintenance) = store.load()?;
        info!(
            reservations = reservations.len(),
            maintenance = maintenance.len(),
            "booking session opened"
        );
        Ok(Self {
            store,
            policy,
            reservations,
            maintenance,
        })
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// Discard the session and re-read both datasets from storage.
    pub fn reload(&mut self) -> Result<(), EngineError> {
        let (reservations, maintenance) = self.store.load()?;
        self.reservations = reservations;
        self.maintenance = maintenance;
        Ok(())
    }

    /// Persist `next` and make it the current reservations dataset. Ids in
    /// `next` are kept as given.
    pub(super) fn commit_reservations(
        &mut self,
        next: Vec<Reservation>,
    ) -> Result<(), EngineError> {
        self.store.save_reservations(&next)?;
        self.reservations = next;
        Ok(())
    }

    /// Persist `next` and make it the current maintenance dataset.
    pub(super) fn commit_maintenance(
        &mut self,
        next: Vec<MaintenanceBlock>,
    ) -> Result<(), EngineError> {
        self.store.save_maintenance(&next)?;
        self.maintenance = next;
        Ok(())
    }
}
