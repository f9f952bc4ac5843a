use aquabear_shared::ReservationStatus;
use serde::Serialize;

/// Something staff can do to a reservation from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffAction {
    Confirm,
    Cancel,
    Delete,
}

impl StaffAction {
    pub fn for_status(status: ReservationStatus) -> Option<StaffAction> {
        match status {
            ReservationStatus::Confirmed => Some(StaffAction::Confirm),
            ReservationStatus::Cancelled => Some(StaffAction::Cancel),
            ReservationStatus::Pending => None,
        }
    }

    fn target_name(&self) -> &'static str {
        match self {
            StaffAction::Confirm => "confirmed",
            StaffAction::Cancel => "cancelled",
            StaffAction::Delete => "removed",
        }
    }
}

/// Actions the console offers for a record in `status`.
///
/// Pending records must be confirmed or cancelled before they can be deleted.
pub fn available_actions(status: ReservationStatus) -> &'static [StaffAction] {
    match status {
        ReservationStatus::Pending => &[StaffAction::Confirm, StaffAction::Cancel],
        ReservationStatus::Confirmed | ReservationStatus::Cancelled => &[StaffAction::Delete],
    }
}

/// Check `action` against the current status.
pub fn authorize(status: ReservationStatus, action: StaffAction) -> Result<(), WorkflowError> {
    if available_actions(status).contains(&action) {
        Ok(())
    } else {
        Err(WorkflowError::InvalidTransition {
            from: status,
            to: action.target_name(),
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: &'static str,
    },

    #[error("Status {0} cannot be set by staff")]
    NotSettable(ReservationStatus),
}
