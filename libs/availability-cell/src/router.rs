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

pub fn availability_routes(state: Arc<AppConfig>, policy: Arc<PermissionPolicy>) -> Router {
    Router::new()
        .route("/", post(handlers::create_availability))
        .route("/{availability_id}", get(handlers::get_availability))
        .route("/{availability_id}", put(handlers::update_availability))
        .route("/{availability_id}", delete(handlers::delete_availability))
        .route(
            "/doctors/{doctor_id}",
            get(handlers::get_doctor_availabilities),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(Extension(policy))
        .with_state(state)
}
