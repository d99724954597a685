use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_models::policy::{Action, PermissionPolicy, Resource, UserRole};

use crate::models::{
    AppointmentError, BookAppointmentRequest, CompleteAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::booking::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::AvailabilityNotFound => {
            AppError::NotFound("Availability not found".to_string())
        }
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::InvalidPatient(msg) => AppError::BadRequest(msg),
        AppointmentError::Conflict(msg) => AppError::Conflict(msg),
        AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
        AppointmentError::InvalidStatusTransition(status) => AppError::Conflict(format!(
            "Appointment in {} state cannot be modified",
            status
        )),
        AppointmentError::Database(msg) => AppError::Database(msg),
    }
}

fn role_of(user: &User) -> Option<UserRole> {
    user.role.as_deref().and_then(|r| r.parse().ok())
}

/// Employees and admins see and manage records across the whole clinic;
/// patients and doctors are scoped to their own.
fn is_clinic_staff(user: &User) -> bool {
    matches!(
        role_of(user),
        Some(UserRole::Employee) | Some(UserRole::Admin)
    )
}

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Read) {
        return Err(AppError::Forbidden(
            "Not authorized to view slots".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let slots = service
        .get_available_slots(&availability_id, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "availability_id": availability_id,
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Create) {
        return Err(AppError::Forbidden(
            "Not authorized to book appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointment = service
        .book_appointment(request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Read) {
        return Err(AppError::Forbidden(
            "Not authorized to view appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointment = service
        .get_appointment(&appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    let is_own = user.id == appointment.patient_id.to_string()
        || user.id == appointment.doctor_id.to_string();
    if !is_own && !is_clinic_staff(&user) {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Update) {
        return Err(AppError::Forbidden(
            "Not authorized to update appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointment = service
        .update_appointment(&appointment_id, request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Update) {
        return Err(AppError::Forbidden(
            "Not authorized to cancel appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointment = service
        .cancel_appointment(&appointment_id, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Completion is a clinical action; patients never perform it.
    if role_of(&user) == Some(UserRole::Patient)
        || !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Update)
    {
        return Err(AppError::Forbidden(
            "Not authorized to complete appointments".to_string(),
        ));
    }

    if request.prescription.is_some()
        && !policy.allows_str(user.role.as_deref(), Resource::Prescriptions, Action::Create)
    {
        return Err(AppError::Forbidden(
            "Not authorized to attach prescriptions".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointment = service
        .complete_appointment(&appointment_id, request, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Appointments, Action::Delete) {
        return Err(AppError::Forbidden(
            "Not authorized to delete appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    service
        .delete_appointment(&appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({ "success": true })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(patient_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = user.id == patient_id;
    if !is_self && !is_clinic_staff(&user) {
        return Err(AppError::Forbidden(
            "Not authorized to view this patient's appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointments = service
        .get_patient_appointments(&patient_id, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = user.id == doctor_id;
    if !is_self && !is_clinic_staff(&user) {
        return Err(AppError::Forbidden(
            "Not authorized to view this doctor's appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);

    let appointments = service
        .get_doctor_appointments(&doctor_id, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
