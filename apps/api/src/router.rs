use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{appointment_routes, slot_routes};
use availability_cell::router::availability_routes;
use shared_config::AppConfig;
use shared_models::policy::PermissionPolicy;
use user_cell::router::user_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    // One policy table shared by every cell.
    let policy = Arc::new(PermissionPolicy::default());

    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/users", user_routes(state.clone(), policy.clone()))
        .nest(
            "/availabilities",
            availability_routes(state.clone(), policy.clone())
                .merge(slot_routes(state.clone(), policy.clone())),
        )
        .nest("/appointments", appointment_routes(state, policy))
}
