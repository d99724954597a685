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
use shared_models::policy::{Action, PermissionPolicy, Resource};

use crate::models::{AvailabilityError, CreateAvailabilityRequest, UpdateAvailabilityRequest};
use crate::services::availability::AvailabilityService;

fn map_availability_error(e: AvailabilityError) -> AppError {
    match e {
        AvailabilityError::NotFound => AppError::NotFound("Availability not found".to_string()),
        AvailabilityError::ValidationError(msg) => AppError::ValidationError(msg),
        AvailabilityError::InvalidDoctor(id) => {
            AppError::BadRequest(format!("No doctor with ID {}", id))
        }
        AvailabilityError::Conflict(msg) => AppError::Conflict(msg),
        AvailabilityError::HasActiveAppointments => AppError::Conflict(
            "Availability still has scheduled appointments and cannot be deleted".to_string(),
        ),
        AvailabilityError::Database(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Availabilities, Action::Create) {
        return Err(AppError::Forbidden(
            "Not authorized to create availabilities".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);

    let availability = service
        .create_availability(&user.id, request, token)
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Availabilities, Action::Read) {
        return Err(AppError::Forbidden(
            "Not authorized to view availabilities".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);

    let availability = service
        .get_availability_by_id(&availability_id, token)
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!(availability)))
}

#[axum::debug_handler]
pub async fn get_doctor_availabilities(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Availabilities, Action::Read) {
        return Err(AppError::Forbidden(
            "Not authorized to view availabilities".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);

    let availabilities = service
        .get_doctor_availabilities(&doctor_id, token)
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "availabilities": availabilities,
        "total": availabilities.len()
    })))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Availabilities, Action::Update) {
        return Err(AppError::Forbidden(
            "Not authorized to update availabilities".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);

    let availability = service
        .update_availability(&availability_id, request, token)
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({
        "success": true,
        "availability": availability
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Availabilities, Action::Delete) {
        return Err(AppError::Forbidden(
            "Not authorized to delete availabilities".to_string(),
        ));
    }

    let service = AvailabilityService::new(&state);

    service
        .delete_availability(&availability_id, token)
        .await
        .map_err(map_availability_error)?;

    Ok(Json(json!({ "success": true })))
}
