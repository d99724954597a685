use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Extension, Router,
};

use shared_config::AppConfig;
use shared_models::policy::PermissionPolicy;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppConfig>, policy: Arc<PermissionPolicy>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}", put(handlers::update_appointment))
        .route("/{appointment_id}", delete(handlers::delete_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route(
            "/{appointment_id}/complete",
            post(handlers::complete_appointment),
        )
        .route(
            "/patients/{patient_id}",
            get(handlers::get_patient_appointments),
        )
        .route(
            "/doctors/{doctor_id}",
            get(handlers::get_doctor_appointments),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(Extension(policy));

    Router::new().merge(protected_routes).with_state(state)
}

/// Mounted under /availabilities next to the schedule CRUD routes; the
/// free-slot computation belongs to the booking side.
pub fn slot_routes(state: Arc<AppConfig>, policy: Arc<PermissionPolicy>) -> Router {
    Router::new()
        .route(
            "/{availability_id}/slots",
            get(handlers::get_available_slots),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(Extension(policy))
        .with_state(state)
}
