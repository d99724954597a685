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

pub fn user_routes(state: Arc<AppConfig>, policy: Arc<PermissionPolicy>) -> Router {
    // Registration is the only unauthenticated route in the API.
    let public_routes = Router::new().route("/register", post(handlers::register));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_user))
        .route("/me", get(handlers::get_me))
        .route("/{user_id}", get(handlers::get_user))
        .route("/{user_id}", put(handlers::update_user))
        .route("/{user_id}", delete(handlers::delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(Extension(policy));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
