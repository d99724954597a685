use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Appointments move Scheduled -> Completed or Scheduled -> Cancelled.
/// Completed and Cancelled are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// A booked slot. `time` is the slot start as a wall-clock "HH:MM" string,
/// matching the strings the slot generator emits for the availability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub availability_id: Uuid,
    pub date: NaiveDate,
    pub time: String,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub prescription: Option<String>,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub availability_id: Uuid,
    pub time: String,
    /// Omitted for self-service bookings; staff supply it to book on a
    /// patient's behalf.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub prescription: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAppointmentRequest {
    #[serde(default)]
    pub availability_id: Option<Uuid>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub prescription: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub prescription: Option<String>,
}

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,
    #[error("Availability not found")]
    AvailabilityNotFound,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid patient reference: {0}")]
    InvalidPatient(String),
    #[error("Slot conflict: {0}")]
    Conflict(String),
    #[error("Not authorized: {0}")]
    Forbidden(String),
    #[error("Invalid status transition from {0}")]
    InvalidStatusTransition(AppointmentStatus),
    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::Scheduled).unwrap(),
            json!("scheduled")
        );
        assert_eq!(
            serde_json::to_value(AppointmentStatus::Cancelled).unwrap(),
            json!("cancelled")
        );
    }

    #[test]
    fn appointment_row_deserializes() {
        let row = json!({
            "id": Uuid::new_v4(),
            "availability_id": Uuid::new_v4(),
            "date": "2026-09-01",
            "time": "09:30",
            "duration_minutes": 30,
            "status": "scheduled",
            "prescription": null,
            "patient_id": Uuid::new_v4(),
            "doctor_id": Uuid::new_v4(),
            "created_at": "2026-08-01T00:00:00Z",
            "updated_at": "2026-08-01T00:00:00Z"
        });

        let appointment: Appointment = serde_json::from_value(row).unwrap();
        assert_eq!(appointment.time, "09:30");
        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert!(appointment.prescription.is_none());
    }

    #[test]
    fn booking_request_accepts_minimal_payload() {
        let body = json!({
            "availability_id": Uuid::new_v4(),
            "time": "10:00"
        });

        let request: BookAppointmentRequest = serde_json::from_value(body).unwrap();
        assert!(request.patient_id.is_none());
        assert!(request.duration_minutes.is_none());
        assert!(request.prescription.is_none());
    }
}
