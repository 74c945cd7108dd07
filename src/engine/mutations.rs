use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::form::UNSET;
use crate::model::*;
use crate::observability::{
    MAINTENANCE_CREATED_TOTAL, MAINTENANCE_REJECTED_TOTAL, MAINTENANCE_REMOVED_TOTAL,
    RESERVATIONS_CANCELLED_TOTAL, RESERVATIONS_CREATED_TOTAL, RESERVATIONS_REJECTED_TOTAL,
    rejection_label,
};

use super::conflict::{check_no_conflict, find_reservation_overlap, validate_endpoints};
use super::{Engine, EngineError};

impl Engine {
    /// Validate, conflict-check and persist a new reservation.
    pub fn create_reservation(
        &mut self,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        match self.try_create_reservation(request) {
            Ok(created) => {
                metrics::counter!(RESERVATIONS_CREATED_TOTAL).increment(1);
                info!(
                    id = %created.id,
                    employee = %created.employee,
                    vehicle = %created.vehicle,
                    "reservation created"
                );
                Ok(created)
            }
            Err(e) => {
                metrics::counter!(RESERVATIONS_REJECTED_TOTAL, "reason" => rejection_label(&e))
                    .increment(1);
                debug!(error = %e, "reservation rejected");
                Err(e)
            }
        }
    }

    fn try_create_reservation(
        &mut self,
        request: ReservationRequest,
    ) -> Result<Reservation, EngineError> {
        let employee = request
            .employee
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty() && *e != UNSET)
            .ok_or(EngineError::IncompleteInput("employee"))?
            .to_string();
        let vehicle = request
            .vehicle
            .ok_or(EngineError::IncompleteInput("vehicle"))?;
        let span = validate_endpoints(request.start, request.end)?;
        check_no_conflict(&span, vehicle, &self.reservations, &self.maintenance)?;

        let mut candidate = Reservation::new(employee, vehicle, span, non_empty(request.reason));
        candidate.id = fresh_id(&self.reservations, &candidate);
        let mut next = self.reservations.clone();
        next.push(candidate);
        let index = next.len() - 1;
        self.commit_reservations(next)?;
        Ok(self.reservations[index].clone())
    }

    /// Validate and persist a maintenance block, subject to the override policy.
    pub fn create_maintenance_block(
        &mut self,
        request: MaintenanceRequest,
    ) -> Result<MaintenanceBlock, EngineError> {
        match self.try_create_maintenance_block(request) {
            Ok(created) => {
                metrics::counter!(MAINTENANCE_CREATED_TOTAL).increment(1);
                info!(id = %created.id, vehicle = %created.vehicle, "maintenance block created");
                Ok(created)
            }
            Err(e) => {
                metrics::counter!(MAINTENANCE_REJECTED_TOTAL, "reason" => rejection_label(&e))
                    .increment(1);
                debug!(error = %e, "maintenance block rejected");
                Err(e)
            }
        }
    }

    fn try_create_maintenance_block(
        &mut self,
        request: MaintenanceRequest,
    ) -> Result<MaintenanceBlock, EngineError> {
        let span = validate_endpoints(request.start, request.end)?;
        let vehicle = request.vehicle;

        if let Some(id) = find_reservation_overlap(&span, vehicle, &self.reservations) {
            if !self.policy.allow_maintenance_override {
                return Err(EngineError::ReservationConflict(id));
            }
            let affected = self
                .reservations
                .iter()
                .filter(|r| r.vehicle == vehicle && r.span.overlaps(&span))
                .count();
            warn!(
                vehicle = %vehicle,
                affected,
                first = %id,
                "maintenance block overlaps confirmed reservations"
            );
        }

        let mut candidate = MaintenanceBlock::new(vehicle, span, non_empty(request.reason));
        candidate.id = fresh_id(&self.maintenance, &candidate);
        let mut next = self.maintenance.clone();
        next.push(candidate);
        let index = next.len() - 1;
        self.commit_maintenance(next)?;
        Ok(self.maintenance[index].clone())
    }

    /// Remove exactly the reservation with `id`.
    pub fn cancel_reservation(&mut self, id: Ulid) -> Result<Reservation, EngineError> {
        let index = self
            .reservations
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("reservation {id}")))?;
        self.remove_reservation_at(index)
    }

    /// Cancel by the rendered summary. Refuses when the selector is ambiguous.
    pub fn cancel_reservation_by_summary(
        &mut self,
        selector: &str,
    ) -> Result<Reservation, EngineError> {
        let selector = selector.trim();
        let matches: Vec<usize> = self
            .reservations
            .iter()
            .enumerate()
            .filter(|(_, r)| r.summary() == selector)
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [] => Err(EngineError::NotFound(format!("reservation {selector:?}"))),
            [index] => self.remove_reservation_at(*index),
            many => Err(EngineError::AmbiguousSelector(many.len())),
        }
    }

    fn remove_reservation_at(&mut self, index: usize) -> Result<Reservation, EngineError> {
        let mut next = self.reservations.clone();
        let removed = next.remove(index);
        self.commit_reservations(next)?;
        metrics::counter!(RESERVATIONS_CANCELLED_TOTAL).increment(1);
        info!(id = %removed.id, summary = %removed.summary(), "reservation cancelled");
        Ok(removed)
    }

    pub fn remove_maintenance_block(&mut self, id: Ulid) -> Result<MaintenanceBlock, EngineError> {
        let index = self
            .maintenance
            .iter()
            .position(|b| b.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("maintenance block {id}")))?;
        let mut next = self.maintenance.clone();
        let removed = next.remove(index);
        self.commit_maintenance(next)?;
        metrics::counter!(MAINTENANCE_REMOVED_TOTAL).increment(1);
        info!(id = %removed.id, vehicle = %removed.vehicle, "maintenance block removed");
        Ok(removed)
    }
}
