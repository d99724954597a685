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

use crate::models::{CreateUserRequest, RegisterRequest, UpdateUserRequest, UserError};
use crate::services::user::UserService;

fn map_user_error(e: UserError) -> AppError {
    match e {
        UserError::NotFound => AppError::NotFound("User not found".to_string()),
        UserError::ValidationError(msg) => AppError::ValidationError(msg),
        UserError::Conflict(msg) => AppError::Conflict(msg),
        UserError::Database(msg) => AppError::Database(msg),
    }
}

/// Public self-registration; always produces a patient account.
#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    let service = UserService::new(&state);

    let account = service.register(request).await.map_err(map_user_error)?;

    Ok(Json(json!({
        "success": true,
        "user": account
    })))
}

#[axum::debug_handler]
pub async fn create_user(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Users, Action::Create) {
        return Err(AppError::Forbidden(
            "Not authorized to create users".to_string(),
        ));
    }

    let service = UserService::new(&state);

    let account = service
        .create_user(request, token)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "success": true,
        "user": account
    })))
}

#[axum::debug_handler]
pub async fn get_me(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = UserService::new(&state);

    let account = service
        .get_user(&user.id, token)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn get_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = user.id == user_id;
    if !is_self && !policy.allows_str(user.role.as_deref(), Resource::Users, Action::Read) {
        return Err(AppError::Forbidden(
            "Not authorized to view this user".to_string(),
        ));
    }

    let service = UserService::new(&state);

    let account = service
        .get_user(&user_id, token)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!(account)))
}

#[axum::debug_handler]
pub async fn update_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let is_self = user.id == user_id;
    let is_user_admin = policy.allows_str(user.role.as_deref(), Resource::Users, Action::Update);

    if !is_self && !is_user_admin {
        return Err(AppError::Forbidden(
            "Not authorized to update this user".to_string(),
        ));
    }
    // Role changes are reserved for user administrators.
    if request.role.is_some() && !is_user_admin {
        return Err(AppError::Forbidden(
            "Not authorized to change roles".to_string(),
        ));
    }

    let service = UserService::new(&state);

    let account = service
        .update_user(&user_id, request, token)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({
        "success": true,
        "user": account
    })))
}

#[axum::debug_handler]
pub async fn delete_user(
    State(state): State<Arc<AppConfig>>,
    Path(user_id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Extension(policy): Extension<Arc<PermissionPolicy>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !policy.allows_str(user.role.as_deref(), Resource::Users, Action::Delete) {
        return Err(AppError::Forbidden(
            "Not authorized to delete users".to_string(),
        ));
    }

    let service = UserService::new(&state);

    service
        .delete_user(&user_id, token)
        .await
        .map_err(map_user_error)?;

    Ok(Json(json!({ "success": true })))
}
