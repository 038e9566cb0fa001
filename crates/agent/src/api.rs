//! HTTP control surface plus health checks and Prometheus metrics

use agent_lib::{
    control::{cpu_choices, LimitSelection, RejectedEntry, MEMORY_CHOICES},
    health::{ComponentStatus, HealthRegistry},
    ContainerSummary, DesiredState, LimitsService,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub service: LimitsService,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, service: LimitsService) -> Self {
        Self {
            health_registry,
            service,
        }
    }
}

/// Choices offered to the operator
#[derive(Debug, Serialize, Deserialize)]
pub struct OptionsResponse {
    pub memory: Vec<String>,
    pub cpus: Vec<String>,
}

/// Full-replacement submission of desired limits
#[derive(Debug, Serialize, Deserialize)]
pub struct LimitsRequest {
    pub containers: Vec<LimitSelection>,
}

/// What was saved and what was dropped
#[derive(Debug, Serialize, Deserialize)]
pub struct LimitsResponse {
    pub saved: DesiredState,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still reconciling
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, e);
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Running containers the operator can limit
async fn list_containers(State(state): State<Arc<AppState>>) -> Response {
    match state.service.running_containers().await {
        Ok(containers) => Json::<Vec<ContainerSummary>>(containers).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list containers");
            error_response(StatusCode::BAD_GATEWAY, e)
        }
    }
}

async fn options() -> Json<OptionsResponse> {
    Json(OptionsResponse {
        memory: MEMORY_CHOICES.iter().map(|m| m.to_string()).collect(),
        cpus: cpu_choices(),
    })
}

async fn get_limits(State(state): State<Arc<AppState>>) -> Json<DesiredState> {
    Json(state.service.desired_state())
}

/// Replace the desired state and reconcile immediately
async fn put_limits(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LimitsRequest>,
) -> Response {
    match state.service.submit(&request.containers) {
        Ok(submission) => {
            info!(
                saved = submission.state.len(),
                rejected = submission.rejected.len(),
                "Desired limits updated"
            );
            Json(LimitsResponse {
                saved: submission.state,
                rejected: submission.rejected,
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to save desired limits");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

async fn reconcile(State(state): State<Arc<AppState>>) -> StatusCode {
    state.service.request_reconcile();
    StatusCode::ACCEPTED
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/containers", get(list_containers))
        .route("/api/options", get(options))
        .route("/api/limits", get(get_limits).put(put_limits))
        .route("/api/reconcile", post(reconcile))
        .with_state(state)
}

/// Start the API server
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    Ok(())
}
