//! Route modules for the Bitext server

pub mod health;
pub mod session;
pub mod tasks;
pub mod translate;

use axum::{middleware, routing::get, Router};

use crate::state::AppState;

/// Public API: health plus the session-scoped `/api/v1` routes
pub fn api_router(state: AppState) -> Router {
    let scoped = Router::new()
        .nest("/api/v1/translate", translate::router())
        .nest("/api/v1/tasks", tasks::router())
        .nest("/api/v1/session", session::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::session_layer,
        ));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/health", get(health::health_check))
        .merge(scoped)
        .with_state(state)
}
