// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::Role;

use crate::models::{allowed_actions, Appointment, AppointmentAction, AppointmentError, AppointmentStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: *current_status,
                to: *new_status,
            });
        }

        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: &AppointmentStatus) -> &'static [AppointmentStatus] {
        match current_status {
            AppointmentStatus::Requested => &[AppointmentStatus::Accepted, AppointmentStatus::Rejected],
            AppointmentStatus::Accepted => &[AppointmentStatus::Completed],
            // Terminal states - no transitions allowed
            AppointmentStatus::Rejected => &[],
            AppointmentStatus::Completed => &[],
        }
    }

    /// Check `role` may take `action` on `appointment`, including any status
    /// change the action implies.
    pub fn ensure_allowed(
        &self,
        appointment: &Appointment,
        action: AppointmentAction,
        role: Role,
    ) -> Result<(), AppointmentError> {
        if !allowed_actions(&appointment.status, role).contains(&action) {
            warn!(
                "Refusing {} on appointment {} ({}) for {}",
                action, appointment.id, appointment.status, role
            );
            return Err(AppointmentError::ActionNotAllowed {
                action,
                status: appointment.status,
                role,
            });
        }

        if let Some(next) = action.resulting_status() {
            self.validate_status_transition(&appointment.status, &next)?;
        }

        Ok(())
    }
}
