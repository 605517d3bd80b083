use org_portal::{
    AccessGate, AppState,
    auth::{JwtSessionResolver, SessionState},
    config::{AppConfig, Env, MembershipBackend},
    create_router,
    repository::{PostgresRepository, RepositoryState, SupabaseRestRepository},
    route_table::RouteTable,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Initializes configuration, logging, the membership backend and the access gate,
/// then serves the HTTP API.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise sensible defaults for local development.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "org_portal=debug,tower_http=info,axum=trace".into());

    // 3. Pretty logs locally, JSON in production for the log aggregator.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Membership Backend
    let repo: RepositoryState = match &config.membership_backend {
        MembershipBackend::Postgres { db_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");
            tracing::info!("Reading memberships from Postgres");
            Arc::new(PostgresRepository::new(pool))
        }
        MembershipBackend::SupabaseRest { url, service_key } => {
            tracing::info!("Reading memberships through the Supabase REST gateway");
            Arc::new(SupabaseRestRepository::new(url, service_key))
        }
    };

    // 5. Session Resolution & Access Gate
    let sessions: SessionState = Arc::new(JwtSessionResolver::new(
        &config.jwt_secret,
        &config.jwt_audience,
    ));

    let gate = AccessGate::new(
        RouteTable::dashboard(),
        sessions,
        repo.clone(),
        config.session_cookie_name.clone(),
    )
    .with_dev_bypass(config.env == Env::Local);

    // 6. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        gate: Arc::new(gate),
        config,
    };

    // 7. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
