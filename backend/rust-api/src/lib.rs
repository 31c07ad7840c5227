#![allow(dead_code)]

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod progress;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: std::sync::Arc<services::AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any); // TODO: restrict to specific origins in production

    Router::new()
        // Public endpoints (no auth required)
        .route("/health", get(handlers::health_check))
        // Metrics endpoint with Basic Auth protection
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        // Auth endpoints (mixed: some public, some protected)
        .nest("/api/v1/auth", auth_routes(app_state.clone()))
        // Protected endpoints (require JWT)
        .nest(
            "/api/v1/paths",
            paths_routes(app_state.clone()).route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/lessons",
            lessons_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/quizzes",
            quizzes_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .nest(
            "/api/v1/chat",
            chat_routes().route_layer(middleware::from_fn_with_state(
                app_state.clone(),
                middlewares::auth::auth_middleware,
            )),
        )
        .with_state(app_state)
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn paths_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Generation gets its own per-user rate limit on top of auth
    let generate_route = Router::new()
        .route("/generate", post(handlers::paths::generate_path))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::generate_rate_limit_middleware,
        ));

    Router::new()
        .route(
            "/active",
            get(handlers::paths::get_active_path).delete(handlers::paths::delete_active_path),
        )
        .route(
            "/{id}",
            get(handlers::paths::get_path_by_id).delete(handlers::paths::delete_path_by_id),
        )
        .route("/{id}/stats", get(handlers::paths::get_path_stats))
        .route("/{id}/navigation", get(handlers::paths::get_path_navigation))
        .merge(generate_route)
}

fn lessons_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/{id}/complete", post(handlers::lessons::complete_lesson))
}

fn quizzes_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/{id}/submit", post(handlers::quizzes::submit_quiz_score))
}

fn chat_routes() -> Router<std::sync::Arc<services::AppState>> {
    Router::new().route("/", post(handlers::chat::send_message))
}

fn auth_routes(
    app_state: std::sync::Arc<services::AppState>,
) -> Router<std::sync::Arc<services::AppState>> {
    // Public routes with rate limiting
    let register_route = Router::new()
        .route("/register", post(handlers::auth::register))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::register_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let refresh_route = Router::new().route("/refresh", post(handlers::auth::refresh_token));

    let public_routes = register_route.merge(login_route).merge(refresh_route);

    // Protected routes (require JWT auth)
    let protected_routes = Router::new()
        .route("/me", get(handlers::auth::get_current_user))
        .route("/logout", post(handlers::auth::logout))
        .route("/change-password", post(handlers::auth::change_password))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
