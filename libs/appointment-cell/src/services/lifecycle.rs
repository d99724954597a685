use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Guards the appointment state machine:
/// Scheduled -> Completed | Cancelled, both terminal.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current: &AppointmentStatus,
        new: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition: {:?} -> {:?}", current, new);

        // Re-cancelling is tolerated; a completed record never accepts
        // another write.
        let is_noop = current == new && *current != AppointmentStatus::Completed;

        if !is_noop && !self.get_valid_transitions(current).contains(new) {
            warn!("Invalid status transition attempted: {:?} -> {:?}", current, new);
            return Err(AppointmentError::InvalidStatusTransition(current.clone()));
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => {
                vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled]
            }
            AppointmentStatus::Completed => vec![],
            AppointmentStatus::Cancelled => vec![],
        }
    }

    pub fn is_terminal(&self, status: &AppointmentStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn scheduled_can_complete_or_cancel() {
        let lifecycle = AppointmentLifecycleService::new();

        lifecycle
            .validate_status_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Completed)
            .unwrap();
        lifecycle
            .validate_status_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Cancelled)
            .unwrap();
    }

    #[test]
    fn completed_is_terminal() {
        let lifecycle = AppointmentLifecycleService::new();

        let err = lifecycle
            .validate_status_transition(&AppointmentStatus::Completed, &AppointmentStatus::Cancelled)
            .unwrap_err();
        assert_matches!(
            err,
            AppointmentError::InvalidStatusTransition(AppointmentStatus::Completed)
        );

        // Not even a repeated completion.
        lifecycle
            .validate_status_transition(&AppointmentStatus::Completed, &AppointmentStatus::Completed)
            .unwrap_err();
        assert!(lifecycle.is_terminal(&AppointmentStatus::Completed));
    }

    #[test]
    fn cancelled_is_terminal() {
        let lifecycle = AppointmentLifecycleService::new();

        let err = lifecycle
            .validate_status_transition(&AppointmentStatus::Cancelled, &AppointmentStatus::Scheduled)
            .unwrap_err();
        assert_matches!(
            err,
            AppointmentError::InvalidStatusTransition(AppointmentStatus::Cancelled)
        );
        assert!(lifecycle.is_terminal(&AppointmentStatus::Cancelled));
    }

    #[test]
    fn setting_the_same_status_is_a_no_op() {
        let lifecycle = AppointmentLifecycleService::new();

        lifecycle
            .validate_status_transition(&AppointmentStatus::Cancelled, &AppointmentStatus::Cancelled)
            .unwrap();
    }
}
