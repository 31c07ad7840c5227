use axum::Router;
use pathai_api::{config::Config, create_router, services::AppState};
use std::sync::Arc;

/// Builds the full application router against the test databases,
/// returning the Mongo handle so tests can seed fixture documents.
pub async fn create_test_app() -> (Router, mongodb::Database) {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let database = mongo_client.database(&config.mongo_database);

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::new(config, mongo_client, redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    (create_router(app_state), database)
}
