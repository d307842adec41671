//! API route definitions.

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.allowed_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/health", get(handlers::health))
        // Identity tier
        .route(
            "/users",
            post(handlers::users::create_user).get(handlers::users::list_users),
        )
        .route(
            "/documents",
            post(handlers::documents::create_document)
                .get(handlers::documents::list_documents)
                .delete(handlers::documents::delete_document),
        )
        .route(
            "/documents/{name}",
            get(handlers::documents::read_document)
                .delete(handlers::documents::delete_document_by_path),
        )
        .route("/spawn", post(handlers::sessions::spawn))
        .route("/server-status", get(handlers::sessions::server_status))
        .route(
            "/my-servers",
            get(handlers::sessions::my_servers).delete(handlers::sessions::stop_my_server),
        )
        .route(
            "/my-servers/status",
            get(handlers::sessions::my_servers_status),
        )
        // Service tier
        .route("/users/{name}", delete(handlers::users::delete_user))
        .route(
            "/users/{name}/servers",
            get(handlers::users::user_servers),
        )
        .route(
            "/users/{name}/servers/{server}",
            get(handlers::users::user_server),
        )
        .route("/servers", get(handlers::users::all_servers))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];
    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
        HeaderName::from_static("x-api-token"),
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("CORS: ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        tracing::debug!("CORS: no origins configured, cross-origin requests are refused");
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
}
