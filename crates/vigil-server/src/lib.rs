//! Vigil Web Server
//!
//! Axum-based REST API over the Vigil alert engine.
//!
//! Security features:
//! - Cloudflare Access or API key authentication (secure by default, use --no-auth for local dev)
//! - Restrictive CORS policy
//! - Per-user scoping of every alert operation
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use vigil_core::db::Database;
use vigil_core::{AlertService, LogNotifier, RateLimitedNotifier};

mod handlers;
mod scheduler;

pub use scheduler::{start_recompute_scheduler, RecomputeScheduleConfig};

/// Maximum accepted JSON body (64 KB)
pub const MAX_BODY_SIZE: usize = 64 * 1024;

/// Cloudflare Access header for authenticated user email
const CF_ACCESS_USER_HEADER: &str = "cf-access-authenticated-user-email";

/// Authorization header for API key auth
const AUTHORIZATION_HEADER: &str = "authorization";

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Whether authentication is required (secure by default)
    pub require_auth: bool,
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// API keys for service authentication (alternative to Cloudflare Access)
    /// Format: "Bearer <key>" in Authorization header
    pub api_keys: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            allowed_origins: vec![],
            api_keys: vec![],
        }
    }
}

/// Shared application state
pub struct AppState {
    pub service: AlertService,
    pub config: ServerConfig,
}

/// Authentication middleware - accepts Cloudflare Access headers or API keys
///
/// # Security Notes
///
/// **Cloudflare Access headers**: The `CF-Access-Authenticated-User-Email` header is
/// safe behind Cloudflare Tunnel (which strips/rewrites CF headers), but can be spoofed
/// if the server is exposed directly to the internet.
///
/// **API keys**: Compared using constant-time comparison to prevent timing attacks.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.require_auth {
        return next.run(request).await;
    }

    let cf_user = request
        .headers()
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty());

    if let Some(email) = cf_user {
        info!(
            user = %email,
            path = %request.uri().path(),
            "Authenticated via Cloudflare Access header"
        );
        return next.run(request).await;
    }

    let api_key_valid = request
        .headers()
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(|key| validate_api_key(key, &state.config.api_keys))
        .unwrap_or(false);

    if api_key_valid {
        info!(user = "api-key", path = %request.uri().path(), "Authenticated via API key");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Unauthorized request - no valid auth");
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "Authentication required"
        })),
    )
        .into_response()
}

/// Validate an API key against the configured keys using constant-time comparison
/// to prevent timing attacks.
fn validate_api_key(provided: &str, valid_keys: &[String]) -> bool {
    use subtle::ConstantTimeEq;

    let provided_bytes = provided.as_bytes();

    for key in valid_keys {
        let key_bytes = key.as_bytes();
        // Only compare if lengths match (constant-time for same-length keys)
        if provided_bytes.len() == key_bytes.len() && provided_bytes.ct_eq(key_bytes).into() {
            return true;
        }
    }
    false
}

/// Parse a comma-separated `VIGIL_API_KEYS` value
pub fn parse_api_keys(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// Extract the caller's identity from request headers
/// Returns CF Access email, "api-key" for API key auth, or "local-dev" for unauthenticated
pub fn get_user_email(headers: &axum::http::HeaderMap) -> String {
    if let Some(email) = headers
        .get(CF_ACCESS_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        return email.to_string();
    }

    if headers
        .get(AUTHORIZATION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .is_some()
    {
        return "api-key".to_string();
    }

    "local-dev".to_string()
}

/// Resolve the caller to a user id, creating the user on first use
pub(crate) fn current_user(
    state: &AppState,
    headers: &axum::http::HeaderMap,
) -> Result<i64, AppError> {
    let email = get_user_email(headers);
    let user = state.service.db().get_or_create_user(&email)?;
    Ok(user.id)
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router with a default alert service
pub fn create_router(db: Database, config: ServerConfig) -> Router {
    create_router_with_service(AlertService::new(db), config)
}

/// Create the application router around an existing service
///
/// Clones of the service share its stream publisher, so events published
/// by a scheduler built from the same service reach SSE clients.
pub fn create_router_with_service(service: AlertService, config: ServerConfig) -> Router {
    let state = Arc::new(AppState {
        service,
        config: config.clone(),
    });

    let api_routes = Router::new()
        // Listing and metadata
        .route("/alerts", get(handlers::list_alerts))
        .route("/alerts/summary", get(handlers::get_summary))
        .route("/alerts/meta", get(handlers::get_meta))
        .route("/alerts/stream", get(handlers::stream_alerts))
        // Recompute
        .route("/alerts/recompute", post(handlers::recompute_alerts))
        .route("/alerts/backfill", post(handlers::backfill_alerts))
        .route(
            "/alerts/normalize-merchants",
            post(handlers::normalize_merchants),
        )
        // Bulk actions
        .route("/alerts/acknowledge", post(handlers::bulk_acknowledge))
        .route("/alerts/dismiss", post(handlers::bulk_dismiss))
        // Settings and suppression
        .route(
            "/alerts/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route(
            "/alerts/whitelist",
            get(handlers::list_whitelist).post(handlers::add_whitelist),
        )
        .route(
            "/alerts/whitelist/:merchant",
            delete(handlers::remove_whitelist),
        )
        .route(
            "/alerts/muted",
            get(handlers::list_muted).post(handlers::mute_category),
        )
        .route("/alerts/muted/:category", delete(handlers::unmute_category))
        // Recommendations
        .route(
            "/alerts/recommendations",
            get(handlers::list_recommendations),
        )
        .route(
            "/alerts/recommendations/generate",
            post(handlers::generate_recommendations),
        )
        // Single alert
        .route("/alerts/:id", get(handlers::get_alert))
        .route("/alerts/:id/acknowledge", post(handlers::acknowledge_alert))
        .route("/alerts/:id/dismiss", post(handlers::dismiss_alert))
        .route("/alerts/:id/audit", get(handlers::get_alert_audit));

    // Build CORS layer
    let cors = if config.allowed_origins.is_empty() {
        // Restrictive default: only allow same-origin
        CorsLayer::new()
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
    };

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(db: Database, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    if !config.require_auth {
        warn!("⚠️  Authentication disabled - do not expose to network!");
    }

    let notifier = RateLimitedNotifier::from_env(LogNotifier);
    info!(per_hour = notifier.per_hour(), "Alert notifications enabled");
    let service = AlertService::new(db).with_notifier(Arc::new(notifier));

    // Start the periodic recompute/recommendation passes unless disabled
    let schedule = RecomputeScheduleConfig::from_env();
    if schedule.is_enabled() {
        start_recompute_scheduler(service.clone(), schedule);
    }

    let app = create_router_with_service(service, config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        use vigil_core::Error as CoreError;

        let err = err.into();
        let status = match err.downcast_ref::<CoreError>() {
            Some(CoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(CoreError::Forbidden(_)) => StatusCode::FORBIDDEN,
            Some(CoreError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            Some(CoreError::Validation(_)) | Some(CoreError::InvalidData(_)) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            Self {
                status,
                // Return generic message to client
                message: "An internal error occurred".to_string(),
                // Keep full error for logging
                internal: Some(err),
            }
        } else {
            Self {
                status,
                message: err.to_string(),
                internal: None,
            }
        }
    }
}
