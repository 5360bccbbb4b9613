mod error;
mod handlers;
mod middleware;
mod models;
mod state;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};

pub use error::{ApiError, codes};
pub use middleware::{Caller, RequestContext};
pub use state::HttpState;

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route(
            "/ads",
            get(handlers::ads::list_ads).post(handlers::ads::create_ad),
        )
        .route(
            "/ads/{id}",
            get(handlers::ads::get_ad)
                .put(handlers::ads::update_ad)
                .delete(handlers::ads::delete_ad),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::resolve_caller,
        ))
        .layer(from_fn(middleware::log_responses))
        .layer(from_fn(middleware::set_request_context))
        .with_state(state)
}
