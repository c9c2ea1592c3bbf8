use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use rift_backend::api;
use rift_backend::auth::WebhookSecret;
use rift_backend::config::Config;
use rift_backend::db::Database;
use rift_backend::engine::Engine;
use rift_backend::metrics;
use rift_backend::oracle::{Generator, OpenRouterGenerator, Oracle, ScriptedGenerator};
use rift_backend::rate_limit::RateLimiter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::load();
    metrics::register_metrics();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let db = Arc::new(db);

    let generator: Arc<dyn Generator> = match &config.openrouter_api_key {
        Some(key) => Arc::new(OpenRouterGenerator::new(
            &config.oracle_api_url,
            key,
            &config.oracle_model,
        )),
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set; every monster will use fallback content");
            Arc::new(ScriptedGenerator::offline())
        }
    };
    let oracle = Oracle::new(generator, config.oracle_timeout);

    let rate_limiter = if config.rate_limit_enabled {
        RateLimiter::new()
    } else {
        tracing::info!("Rate limiting disabled");
        RateLimiter::disabled()
    };

    let webhook_secret = WebhookSecret::new(config.webhook_secret.as_deref());
    if !webhook_secret.is_enabled() {
        tracing::warn!("WEBHOOK_SECRET not set; action routes accept unauthenticated calls");
    }

    let engine = Engine::new(db, oracle, rate_limiter);
    let app = api::router(engine, webhook_secret)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(
        "Rift backend listening on {addr} (model: {})",
        config.oracle_model
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
