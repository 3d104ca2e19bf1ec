use std::time::Duration;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use http::{HeaderValue, Method, header};
use tower_cookies::CookieManagerLayer;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::{handlers, middleware_layer, state::AppState};

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
            HeaderValue::from_static("http://[::1]:3000"),
        ])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::COOKIE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(86400))
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::auth::index))
        .route("/api/users/exists", get(handlers::users::exists))
        .with_state(state.clone());

    let anonymous_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_anonymous,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/home", get(handlers::auth::home))
        .route("/api/users", get(handlers::users::list_users))
        .route(
            "/api/users/me",
            get(handlers::users::me)
                .put(handlers::users::update_me)
                .delete(handlers::users::delete_me),
        )
        .route("/api/users/{id}", get(handlers::users::get_user))
        .route(
            "/api/users/me/interests/{interest_id}",
            post(handlers::users::add_interest).delete(handlers::users::remove_interest),
        )
        .route(
            "/api/interests",
            get(handlers::interests::list_interests).post(handlers::interests::create_interest),
        )
        .route("/api/interests/exists", get(handlers::interests::exists))
        .route(
            "/api/interests/{id}",
            get(handlers::interests::get_interest)
                .put(handlers::interests::update_interest)
                .delete(handlers::interests::delete_interest),
        )
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware_layer::auth::require_authenticated,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(anonymous_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default())
                .on_request(DefaultOnRequest::default().level(Level::DEBUG))
                .on_response(DefaultOnResponse::default().level(Level::DEBUG))
                .on_failure(DefaultOnFailure::default().level(Level::ERROR)),
        )
        .layer(CookieManagerLayer::new())
        .layer(cors())
}
