use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access control core.
pub mod auth;
pub mod gate;
pub mod roles;
pub mod route_table;

// Application services and components.
pub mod config;
pub mod handlers;
pub mod models;
pub mod repository;

// Module for routing segregation (public vs dashboard).
pub mod routes;
use routes::{dashboard, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use gate::{AccessGate, GateDecision, GateState, RequestContext};
pub use repository::{PostgresRepository, RepositoryState, SupabaseRestRepository};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::register_page, handlers::get_dashboard,
        handlers::list_members, handlers::get_member_for_edit
    ),
    components(
        schemas(
            models::Membership, models::DashboardView, models::AuthPageView, roles::Role,
        )
    ),
    tags(
        (name = "org-portal", description = "Organization dashboard API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Implements the **Unified State Pattern**: the single, cheaply cloneable container
/// holding the membership repository, the access gate and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Membership lookups for handlers (the gate holds its own handle).
    pub repo: RepositoryState,
    /// The access gate applied to every route.
    pub gate: GateState,
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for GateState {
    fn from_ref(app_state: &AppState) -> GateState {
        app_state.gate.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// access_gate_middleware
///
/// Runs the access gate in front of every route. Allowed requests continue with the
/// resolved `AccessContext` in their extensions (read back by the `AuthUser`
/// extractor); denied requests get a 307 to the login or landing page and never
/// reach a handler.
async fn access_gate_middleware(
    State(gate): State<GateState>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = RequestContext::from_http(request.uri(), request.headers(), gate.cookie_name());

    match gate.evaluate(&context).await {
        GateDecision::Allow(access) => {
            request.extensions_mut().insert(access);
            next.run(request).await
        }
        GateDecision::Redirect { location } => Redirect::temporary(&location).into_response(),
    }
}

/// create_router
///
/// Assembles the routing structure, applies the access gate and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(dashboard::dashboard_routes())
        // The gate classifies paths itself, so it wraps every route rather than
        // being layered per router.
        .layer(middleware::from_fn_with_state(
            state.gate.clone(),
            access_gate_middleware,
        ))
        .with_state(state);

    // 3. Observability and Correlation Layers (applied outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a unique UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request tracing span with the `x-request-id` header, so every log
/// line of a request, including the gate's decision, is correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        path = %request.uri().path(),
        req_id = %request_id,
    )
}
