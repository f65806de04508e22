//! HTTP endpoint for scheduled and ad-hoc invocations.
//!
//! `GET /run` starts or resumes a run, `GET /run/:suite` runs one suite
//! against a fresh report. Accepted runs answer 204 with the checkpoint in
//! the `x-report-id` and `x-next-suites` headers; a rejected token answers
//! 401 before anything runs. Invocations are serialized: the browser is
//! shared.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;

use crate::invocation::{InvocationRequest, InvocationResponse, Invoker};
use crate::runner::scheduler::{Deadline, TimeBudget, Unbounded};
use crate::utils::config::ConfigOverride;

/// Time kept back from the invocation limit for uploading and answering
const RESPONSE_RESERVE: Duration = Duration::from_secs(5);

pub const REPORT_ID_HEADER: &str = "x-report-id";
pub const NEXT_SUITES_HEADER: &str = "x-next-suites";
pub const RUN_STATE_HEADER: &str = "x-run-state";

/// Server configuration
pub struct ServerConfig {
    pub port: u16,
    /// Wall-clock limit of one invocation; unbounded when absent
    pub max_run: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 9333,
            max_run: None,
        }
    }
}

pub struct AppState {
    invoker: Invoker,
    max_run: Option<Duration>,
    busy: Mutex<()>,
}

impl AppState {
    pub fn new(invoker: Invoker, max_run: Option<Duration>) -> Self {
        Self {
            invoker,
            max_run,
            busy: Mutex::new(()),
        }
    }

    fn budget(&self) -> Box<dyn TimeBudget> {
        match self.max_run {
            Some(limit) => Box::new(Deadline::from_remaining(limit, RESPONSE_RESERVE)),
            None => Box::new(Unbounded),
        }
    }
}

/// Query of `GET /run`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuery {
    pub report_id: Option<String>,
    pub token: Option<String>,
    /// Comma-separated
    pub next_suites: Option<String>,
    pub digital_product: Option<String>,
    pub environment: Option<String>,
    #[serde(alias = "baseURL")]
    pub base_url: Option<String>,
    pub timeout: Option<u64>,
}

impl RunQuery {
    fn overrides(&self) -> Option<ConfigOverride> {
        let overrides = ConfigOverride {
            digital_product: self.digital_product.clone(),
            environment: self.environment.clone(),
            base_url: self.base_url.clone(),
            timeout: self.timeout,
            suites_list: None,
        };
        let empty = overrides.digital_product.is_none()
            && overrides.environment.is_none()
            && overrides.base_url.is_none()
            && overrides.timeout.is_none();
        (!empty).then_some(overrides)
    }

    fn request(&self) -> InvocationRequest {
        InvocationRequest {
            report_id: self.report_id.clone().filter(|id| !id.is_empty()),
            token: self.token.clone(),
            next_suites: self.next_suites.as_deref().map(split_suites),
        }
    }
}

fn split_suites(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/run", get(run_all))
        .route("/run/:suite", get(run_single))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process stops
pub async fn serve(state: Arc<AppState>, config: &ServerConfig) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, router(state).into_make_service()).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn run_all(State(state): State<Arc<AppState>>, Query(query): Query<RunQuery>) -> Response {
    let _guard = state.busy.lock().await;
    let budget = state.budget();
    let overrides = query.overrides();
    let result = state
        .invoker
        .handle(query.request(), overrides.as_ref(), budget.as_ref())
        .await;
    respond(result)
}

async fn run_single(
    State(state): State<Arc<AppState>>,
    Path(suite): Path<String>,
    Query(query): Query<RunQuery>,
) -> Response {
    let _guard = state.busy.lock().await;
    let budget = state.budget();
    let overrides = query.overrides();
    let result = state
        .invoker
        .handle_single(&suite, query.token.as_deref(), overrides.as_ref(), budget.as_ref())
        .await;
    respond(result)
}

fn respond(result: Result<InvocationResponse>) -> Response {
    let response = match result {
        Ok(response) => response,
        Err(e) => {
            log::error!("Invocation failed: {:#}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "message": format!("{:#}", e) })),
            )
                .into_response();
        }
    };

    let Some(outcome) = response.outcome else {
        let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::UNAUTHORIZED);
        let message = response.message.unwrap_or_default();
        return (status, Json(serde_json::json!({ "message": message }))).into_response();
    };

    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&outcome.report_id) {
        headers.insert(REPORT_ID_HEADER, v);
    }
    match HeaderValue::from_str(&outcome.next_suites.join(",")) {
        Ok(v) => {
            headers.insert(NEXT_SUITES_HEADER, v);
        }
        Err(_) => log::warn!("Suite names cannot be sent as a header: {:?}", outcome.next_suites),
    }
    if let Ok(v) = HeaderValue::from_str(&format!("{:?}", outcome.state).to_lowercase()) {
        headers.insert(RUN_STATE_HEADER, v);
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}
