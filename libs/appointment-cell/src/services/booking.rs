use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::models::{Availability, AvailabilityError};
use availability_cell::services::{generate_slots, AvailabilityService};
use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};
use shared_models::auth::User;
use shared_models::policy::UserRole;
use user_cell::models::UserError;
use user_cell::services::UserService;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
    CompleteAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

/// Slot length a patient gets when no staff override applies.
pub const DEFAULT_SLOT_MINUTES: i32 = 30;

const SLOT_TAKEN_MESSAGE: &str = "This slot is already booked";

/// Coordinates bookings across availabilities, users and the appointments
/// table. The unique index on (availability_id, time, doctor_id) is the
/// authoritative double-booking guard; every pre-check here is a fast path
/// for a friendlier error.
pub struct BookingService {
    supabase: SupabaseClient,
    availabilities: AvailabilityService,
    users: UserService,
    lifecycle: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            availabilities: AvailabilityService::new(config),
            users: UserService::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Slots of an availability that are still free, in generation order.
    pub async fn get_available_slots(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<Vec<String>, AppointmentError> {
        let availability = self.load_availability(availability_id, auth_token).await?;

        let slots = generate_slots(
            availability.opening_time,
            availability.closing_time,
            availability.duration_minutes,
            &availability.break_times,
        );

        let booked = self
            .active_appointments_for(availability_id, auth_token)
            .await?;

        Ok(slots
            .into_iter()
            .filter(|slot| !booked.iter().any(|a| &a.time == slot))
            .collect())
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        caller: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking slot {} on availability {}",
            request.time, request.availability_id
        );

        if request.time.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "time is required".to_string(),
            ));
        }

        let availability = self
            .load_availability(&request.availability_id.to_string(), auth_token)
            .await?;

        let caller_id = parse_caller_id(caller)?;
        let patient_id = self
            .resolve_patient(&request, caller, caller_id, auth_token)
            .await?;

        self.ensure_slot_exists(&availability, &request.time)?;
        self.ensure_slot_free(&availability, &request.time, None, auth_token)
            .await?;

        if role_of(caller) == Some(UserRole::Patient) && patient_id != caller_id {
            return Err(AppointmentError::Forbidden(
                "Patients may only book appointments for themselves".to_string(),
            ));
        }

        // Duration and prescription are staff knobs; a patient always gets
        // the default slot length and an empty prescription.
        let is_patient = role_of(caller) == Some(UserRole::Patient);
        let duration_minutes = if is_patient {
            DEFAULT_SLOT_MINUTES
        } else {
            request.duration_minutes.unwrap_or(DEFAULT_SLOT_MINUTES)
        };
        let prescription = if is_patient { None } else { request.prescription };

        let body = json!({
            "availability_id": availability.id,
            "date": availability.date,
            "time": request.time,
            "duration_minutes": duration_minutes,
            "status": AppointmentStatus::Scheduled,
            "prescription": prescription,
            "patient_id": patient_id,
            "doctor_id": availability.doctor_id,
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_db_error)?;

        let appointment = parse_single(result)?;
        info!("Appointment booked: {}", appointment.id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Partial update. Rescheduling (a new time or availability) re-runs the
    /// same slot and conflict validation as a fresh booking.
    pub async fn update_appointment(
        &self,
        appointment_id: &str,
        request: UpdateAppointmentRequest,
        caller: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.ensure_caller_owns_or_staff(caller, &current)?;

        if let Some(new_status) = &request.status {
            self.lifecycle
                .validate_status_transition(&current.status, new_status)?;
        } else if self.lifecycle.is_terminal(&current.status) {
            return Err(AppointmentError::InvalidStatusTransition(current.status));
        }

        if role_of(caller) == Some(UserRole::Patient) {
            if request.status == Some(AppointmentStatus::Completed) {
                return Err(AppointmentError::Forbidden(
                    "Patients may not complete appointments".to_string(),
                ));
            }
            if request.prescription.is_some() || request.duration_minutes.is_some() {
                return Err(AppointmentError::Forbidden(
                    "Patients may not change duration or prescription".to_string(),
                ));
            }
        }

        let mut body = serde_json::Map::new();

        let rescheduling = request.time.is_some() || request.availability_id.is_some();
        if rescheduling {
            let availability_id = request.availability_id.unwrap_or(current.availability_id);
            let time = request.time.clone().unwrap_or_else(|| current.time.clone());

            let availability = self
                .load_availability(&availability_id.to_string(), auth_token)
                .await?;
            self.ensure_slot_exists(&availability, &time)?;
            self.ensure_slot_free(&availability, &time, Some(current.id), auth_token)
                .await?;

            body.insert("availability_id".to_string(), json!(availability.id));
            body.insert("date".to_string(), json!(availability.date));
            body.insert("time".to_string(), json!(time));
            body.insert("doctor_id".to_string(), json!(availability.doctor_id));
        }

        if let Some(duration) = request.duration_minutes {
            if duration <= 0 {
                return Err(AppointmentError::ValidationError(
                    "duration_minutes must be positive".to_string(),
                ));
            }
            body.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(status) = &request.status {
            body.insert("status".to_string(), json!(status));
        }
        if let Some(prescription) = &request.prescription {
            body.insert("prescription".to_string(), json!(prescription));
        }

        if body.is_empty() {
            return Ok(current);
        }

        self.patch_appointment(appointment_id, Value::Object(body), auth_token)
            .await
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
        caller: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.ensure_caller_owns_or_staff(caller, &current)?;
        self.lifecycle
            .validate_status_transition(&current.status, &AppointmentStatus::Cancelled)?;

        info!("Cancelling appointment: {}", appointment_id);
        self.patch_appointment(
            appointment_id,
            json!({"status": AppointmentStatus::Cancelled}),
            auth_token,
        )
        .await
    }

    /// Marks a scheduled appointment completed, optionally attaching the
    /// prescription text written during the consultation.
    pub async fn complete_appointment(
        &self,
        appointment_id: &str,
        request: CompleteAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle
            .validate_status_transition(&current.status, &AppointmentStatus::Completed)?;

        let mut body = serde_json::Map::new();
        body.insert("status".to_string(), json!(AppointmentStatus::Completed));
        if let Some(prescription) = &request.prescription {
            body.insert("prescription".to_string(), json!(prescription));
        }

        info!("Completing appointment: {}", appointment_id);
        self.patch_appointment(appointment_id, Value::Object(body), auth_token)
            .await
    }

    pub async fn delete_appointment(
        &self,
        appointment_id: &str,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        self.get_appointment(appointment_id, auth_token).await?;

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        info!("Appointment deleted: {}", appointment_id);
        Ok(())
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=date.asc,time.asc",
            patient_id
        );
        self.fetch_many(&path, auth_token).await
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=date.asc,time.asc",
            doctor_id
        );
        self.fetch_many(&path, auth_token).await
    }

    async fn load_availability(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<Availability, AppointmentError> {
        self.availabilities
            .get_availability_by_id(availability_id, auth_token)
            .await
            .map_err(|e| match e {
                AvailabilityError::NotFound => AppointmentError::AvailabilityNotFound,
                other => AppointmentError::Database(other.to_string()),
            })
    }

    async fn resolve_patient(
        &self,
        request: &BookAppointmentRequest,
        caller: &User,
        caller_id: Uuid,
        auth_token: &str,
    ) -> Result<Uuid, AppointmentError> {
        match request.patient_id {
            // A supplied id that is not the caller must reference a real
            // patient account.
            Some(patient_id) if patient_id != caller_id => {
                self.users
                    .find_patient(&patient_id.to_string(), auth_token)
                    .await
                    .map_err(|e| match e {
                        UserError::NotFound => AppointmentError::InvalidPatient(format!(
                            "No patient with ID {}",
                            patient_id
                        )),
                        other => AppointmentError::Database(other.to_string()),
                    })?;
                Ok(patient_id)
            }
            Some(patient_id) => Ok(patient_id),
            None => {
                if role_of(caller) == Some(UserRole::Patient) {
                    Ok(caller_id)
                } else {
                    Err(AppointmentError::ValidationError(
                        "patient_id is required when booking on behalf of a patient".to_string(),
                    ))
                }
            }
        }
    }

    fn ensure_slot_exists(
        &self,
        availability: &Availability,
        time: &str,
    ) -> Result<(), AppointmentError> {
        let slots = generate_slots(
            availability.opening_time,
            availability.closing_time,
            availability.duration_minutes,
            &availability.break_times,
        );

        if !slots.iter().any(|slot| slot == time) {
            return Err(AppointmentError::ValidationError(format!(
                "{} is not a bookable slot of this availability",
                time
            )));
        }
        Ok(())
    }

    async fn ensure_slot_free(
        &self,
        availability: &Availability,
        time: &str,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?availability_id=eq.{}&time=eq.{}&doctor_id=eq.{}&status=neq.cancelled&select=id",
            availability.id, time, availability.doctor_id
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if !existing.is_empty() {
            warn!(
                "Slot {} on availability {} already taken",
                time, availability.id
            );
            return Err(AppointmentError::Conflict(SLOT_TAKEN_MESSAGE.to_string()));
        }
        Ok(())
    }

    fn ensure_caller_owns_or_staff(
        &self,
        caller: &User,
        appointment: &Appointment,
    ) -> Result<(), AppointmentError> {
        if role_of(caller) == Some(UserRole::Patient)
            && caller.id != appointment.patient_id.to_string()
        {
            return Err(AppointmentError::Forbidden(
                "Patients may only manage their own appointments".to_string(),
            ));
        }
        Ok(())
    }

    async fn active_appointments_for(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?availability_id=eq.{}&status=neq.cancelled",
            availability_id
        );
        self.fetch_many(&path, auth_token).await
    }

    async fn patch_appointment(
        &self,
        appointment_id: &str,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_db_error)?;

        parse_single(result)
    }

    async fn fetch_many(
        &self,
        path: &str,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }
}

fn role_of(caller: &User) -> Option<UserRole> {
    caller.role.as_deref().and_then(|r| r.parse().ok())
}

fn parse_caller_id(caller: &User) -> Result<Uuid, AppointmentError> {
    caller
        .id
        .parse()
        .map_err(|_| AppointmentError::ValidationError("Caller id is not a valid UUID".to_string()))
}

fn parse_single(result: Vec<Value>) -> Result<Appointment, AppointmentError> {
    let row = result
        .into_iter()
        .next()
        .ok_or_else(|| AppointmentError::Database("Empty response from database".to_string()))?;
    serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
}

// Insert/update path: a 409 from the unique index reads the same as the
// pre-check result.
fn map_db_error(e: DbError) -> AppointmentError {
    match e {
        DbError::NotFound(_) => AppointmentError::NotFound,
        DbError::UniqueViolation(_) => AppointmentError::Conflict(SLOT_TAKEN_MESSAGE.to_string()),
        other => AppointmentError::Database(other.to_string()),
    }
}
