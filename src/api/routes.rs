use axum::{
    routing::{delete, get},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Entity sets and single entities, e.g. /Organizations('35')?$expand=Roles
        .route("/:resource", get(handlers::get_resource::<S>))
        // Property paths of a single entity
        .route(
            "/:resource/*path",
            delete(handlers::clear_property::<S>).put(handlers::update_property::<S>),
        )
}
