use chrono::{NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, SupabaseClient};

use crate::models::{
    Availability, AvailabilityError, BreakWindow, CreateAvailabilityRequest,
    UpdateAvailabilityRequest,
};

const DUPLICATE_SCHEDULE_MESSAGE: &str =
    "An availability for this doctor on this date already exists";

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a working-day schedule. The caller becomes the owner; the
    /// `(owner, doctor, date)` pre-check gives the friendly error, the
    /// storage unique index has the final word.
    pub async fn create_availability(
        &self,
        owner_id: &str,
        request: CreateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Availability, AvailabilityError> {
        debug!(
            "Creating availability for doctor {} on {}",
            request.doctor_id, request.date
        );

        validate_schedule(
            request.opening_time,
            request.closing_time,
            request.duration_minutes,
            &request.break_times,
        )?;

        self.ensure_doctor_exists(&request.doctor_id.to_string(), auth_token)
            .await?;

        self.check_duplicate_schedule(
            owner_id,
            &request.doctor_id.to_string(),
            request.date,
            None,
            auth_token,
        )
        .await?;

        let availability_data = json!({
            "date": request.date,
            "opening_time": request.opening_time.format("%H:%M").to_string(),
            "closing_time": request.closing_time.format("%H:%M").to_string(),
            "duration_minutes": request.duration_minutes,
            "break_times": request.break_times,
            "doctor_id": request.doctor_id,
            "owner_id": owner_id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/availabilities",
                Some(auth_token),
                Some(availability_data),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_conflict_to_duplicate)?;

        let availability = parse_single(result)?;
        info!("Availability created with ID: {}", availability.id);
        Ok(availability)
    }

    /// Update a schedule. Field validations run against the merged record so
    /// a partial update cannot leave opening past closing or a break outside
    /// the window.
    pub async fn update_availability(
        &self,
        availability_id: &str,
        request: UpdateAvailabilityRequest,
        auth_token: &str,
    ) -> Result<Availability, AvailabilityError> {
        debug!("Updating availability: {}", availability_id);

        let current = self
            .get_availability_by_id(availability_id, auth_token)
            .await?;

        let opening_time = request.opening_time.unwrap_or(current.opening_time);
        let closing_time = request.closing_time.unwrap_or(current.closing_time);
        let duration_minutes = request.duration_minutes.unwrap_or(current.duration_minutes);
        let break_times = request
            .break_times
            .clone()
            .unwrap_or_else(|| current.break_times.clone());

        validate_schedule(opening_time, closing_time, duration_minutes, &break_times)?;

        if let Some(doctor_id) = request.doctor_id {
            self.ensure_doctor_exists(&doctor_id.to_string(), auth_token)
                .await?;
        }

        let date = request.date.unwrap_or(current.date);
        let doctor_id = request.doctor_id.unwrap_or(current.doctor_id);
        if date != current.date || doctor_id != current.doctor_id {
            self.check_duplicate_schedule(
                &current.owner_id.to_string(),
                &doctor_id.to_string(),
                date,
                Some(availability_id),
                auth_token,
            )
            .await?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(date) = request.date {
            update_data.insert("date".to_string(), json!(date));
        }
        if let Some(opening) = request.opening_time {
            update_data.insert(
                "opening_time".to_string(),
                json!(opening.format("%H:%M").to_string()),
            );
        }
        if let Some(closing) = request.closing_time {
            update_data.insert(
                "closing_time".to_string(),
                json!(closing.format("%H:%M").to_string()),
            );
        }
        if let Some(duration) = request.duration_minutes {
            update_data.insert("duration_minutes".to_string(), json!(duration));
        }
        if let Some(breaks) = request.break_times {
            update_data.insert("break_times".to_string(), json!(breaks));
        }
        if let Some(doctor_id) = request.doctor_id {
            update_data.insert("doctor_id".to_string(), json!(doctor_id));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/availabilities?id=eq.{}", availability_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(update_data)),
                &[("Prefer", "return=representation")],
            )
            .await
            .map_err(map_conflict_to_duplicate)?;

        parse_single(result)
    }

    pub async fn get_availability_by_id(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<Availability, AvailabilityError> {
        let path = format!("/rest/v1/availabilities?id=eq.{}", availability_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if result.is_empty() {
            return Err(AvailabilityError::NotFound);
        }

        serde_json::from_value(result[0].clone())
            .map_err(|e| AvailabilityError::Database(e.to_string()))
    }

    pub async fn get_doctor_availabilities(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<Availability>, AvailabilityError> {
        debug!("Fetching availabilities for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/availabilities?doctor_id=eq.{}&order=date.asc,opening_time.asc",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        result
            .into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AvailabilityError::Database(e.to_string()))
            })
            .collect()
    }

    /// Delete a schedule. Blocked while scheduled appointments still point at
    /// it; cancel or complete those first.
    pub async fn delete_availability(
        &self,
        availability_id: &str,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        debug!("Deleting availability: {}", availability_id);

        self.get_availability_by_id(availability_id, auth_token)
            .await?;

        let appointments_path = format!(
            "/rest/v1/appointments?availability_id=eq.{}&status=eq.scheduled&select=id",
            availability_id
        );
        let active: Vec<Value> = self
            .supabase
            .request(Method::GET, &appointments_path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if !active.is_empty() {
            warn!(
                "Rejecting delete of availability {}: {} scheduled appointments",
                availability_id,
                active.len()
            );
            return Err(AvailabilityError::HasActiveAppointments);
        }

        let path = format!("/rest/v1/availabilities?id=eq.{}", availability_id);
        let _: Vec<Value> = self
            .supabase
            .request(Method::DELETE, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        info!("Availability deleted: {}", availability_id);
        Ok(())
    }

    async fn ensure_doctor_exists(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        let path = format!("/rest/v1/users?id=eq.{}&role=eq.doctor&select=id", doctor_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if result.is_empty() {
            return Err(AvailabilityError::InvalidDoctor(doctor_id.to_string()));
        }
        Ok(())
    }

    async fn check_duplicate_schedule(
        &self,
        owner_id: &str,
        doctor_id: &str,
        date: NaiveDate,
        exclude_id: Option<&str>,
        auth_token: &str,
    ) -> Result<(), AvailabilityError> {
        let mut path = format!(
            "/rest/v1/availabilities?owner_id=eq.{}&doctor_id=eq.{}&date=eq.{}&select=id",
            owner_id, doctor_id, date
        );
        if let Some(id) = exclude_id {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if !existing.is_empty() {
            warn!(
                "Duplicate schedule for owner {} doctor {} on {}",
                owner_id, doctor_id, date
            );
            return Err(AvailabilityError::Conflict(
                DUPLICATE_SCHEDULE_MESSAGE.to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_schedule(
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    duration_minutes: i32,
    break_times: &[BreakWindow],
) -> Result<(), AvailabilityError> {
    if opening_time >= closing_time {
        return Err(AvailabilityError::ValidationError(
            "Opening time must be before closing time".to_string(),
        ));
    }

    let window_minutes = (closing_time - opening_time).num_minutes();
    if duration_minutes <= 0 {
        return Err(AvailabilityError::ValidationError(
            "Slot duration must be positive".to_string(),
        ));
    }
    if i64::from(duration_minutes) > window_minutes {
        return Err(AvailabilityError::ValidationError(
            "Slot duration exceeds the working window".to_string(),
        ));
    }

    let mut sorted: Vec<&BreakWindow> = break_times.iter().collect();
    sorted.sort_by_key(|b| b.start_time);

    let mut previous_end: Option<NaiveTime> = None;
    for window in sorted {
        if window.start_time >= window.end_time {
            return Err(AvailabilityError::ValidationError(
                "Break start must be before break end".to_string(),
            ));
        }
        if window.start_time < opening_time || window.end_time > closing_time {
            return Err(AvailabilityError::ValidationError(
                "Breaks must fall within the working window".to_string(),
            ));
        }
        if let Some(end) = previous_end {
            if window.start_time < end {
                return Err(AvailabilityError::ValidationError(
                    "Breaks must not overlap".to_string(),
                ));
            }
        }
        previous_end = Some(window.end_time);
    }

    Ok(())
}

fn parse_single(result: Vec<Value>) -> Result<Availability, AvailabilityError> {
    let row = result
        .into_iter()
        .next()
        .ok_or_else(|| AvailabilityError::Database("Empty insert response".to_string()))?;
    serde_json::from_value(row).map_err(|e| AvailabilityError::Database(e.to_string()))
}

fn map_db_error(err: DbError) -> AvailabilityError {
    match err {
        DbError::NotFound(_) => AvailabilityError::NotFound,
        DbError::UniqueViolation(_) => {
            AvailabilityError::Conflict(DUPLICATE_SCHEDULE_MESSAGE.to_string())
        }
        other => AvailabilityError::Database(other.to_string()),
    }
}

// Insert/update path: a 409 from the unique index reads the same as the
// pre-check result.
fn map_conflict_to_duplicate(err: DbError) -> AvailabilityError {
    match err {
        DbError::UniqueViolation(_) => {
            AvailabilityError::Conflict(DUPLICATE_SCHEDULE_MESSAGE.to_string())
        }
        other => map_db_error(other),
    }
}
