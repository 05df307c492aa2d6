//! HTTP endpoints over the pairing machine.
//!
//! `GET /start`, `GET /qr` and `GET /status` drive and observe pairing;
//! `POST /relay` pushes the current code to the operator and `POST /logout`
//! unlinks the session. Every error body is `{status, message}`.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokobot_channels::generate_qr_image;
use tokobot_core::{
    config::ApiConfig,
    error::{RelayError, TokoError},
    traits::NotificationRelay,
};
use tokobot_pairing::{relay_pairing_code, PairingMachine, StartOutcome, Status};
use tracing::{error, info, warn};

type ApiError = (StatusCode, Json<Value>);

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub machine: Arc<PairingMachine>,
    pub relay: Arc<dyn NotificationRelay>,
    pub relay_timeout: Duration,
}

fn error_body(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(json!({"status": code, "message": message.into()})),
    )
}

fn toko_error(e: &TokoError) -> ApiError {
    let status = match e {
        TokoError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        TokoError::Channel(_) | TokoError::Provider(_) => StatusCode::BAD_GATEWAY,
        TokoError::Relay(r) => return relay_error(r),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, e.code(), e.to_string())
}

fn relay_error(e: &RelayError) -> ApiError {
    let status = match e {
        RelayError::NoCodeAvailable => StatusCode::CONFLICT,
        RelayError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        RelayError::DeliveryFailed { .. } => StatusCode::BAD_GATEWAY,
    };
    error_body(status, e.code(), e.to_string())
}

fn status_message(status: Status) -> &'static str {
    match status {
        Status::Idle => "WhatsApp client has not been started. Call /start first.",
        Status::Connecting => "WhatsApp client is connecting. Check /qr shortly.",
        Status::AwaitingScan => "Scan the pairing QR from /qr with WhatsApp > Linked devices.",
        Status::Ready => "WhatsApp bot is running and ready. Send messages to your bot account.",
        Status::Disconnected => "WhatsApp client is disconnected. Call /start to reconnect.",
    }
}

/// `GET /start`: launch the client unless it is already running.
async fn start(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let outcome = state.machine.start().await.map_err(|e| {
        error!("start failed: {e}");
        toko_error(&e)
    })?;

    let (status, message) = match outcome {
        StartOutcome::AlreadyActive(Status::Ready) => ("ready", status_message(Status::Ready)),
        StartOutcome::AlreadyActive(current) => ("connecting", status_message(current)),
        StartOutcome::Started { resumed: true } => (
            "initializing",
            "WhatsApp client is initializing from the saved session.",
        ),
        StartOutcome::Started { resumed: false } => (
            "initializing",
            "WhatsApp client is initializing. Fetch /qr to scan the pairing code.",
        ),
    };
    Ok(Json(json!({"status": status, "message": message})))
}

/// `GET /qr`: the pairing QR as PNG while awaiting a scan.
async fn qr(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let current = state.machine.current_status();
    match (current.status, current.pairing_code) {
        (Status::AwaitingScan, Some(code)) => {
            let png = generate_qr_image(&code).map_err(|e| {
                error!("QR image generation failed: {e}");
                toko_error(&e)
            })?;
            Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
        }
        (Status::Idle, _) => Err(error_body(
            StatusCode::NOT_FOUND,
            Status::Idle.as_str(),
            status_message(Status::Idle),
        )),
        (status, _) => Ok(Json(json!({
            "status": status.as_str(),
            "message": status_message(status),
        }))
        .into_response()),
    }
}

/// `GET /status`
async fn status(State(state): State<ApiState>) -> Json<Value> {
    let s = state.machine.state();
    Json(json!({
        "status": s.status().as_str(),
        "message": status_message(s.status()),
        "client_identity": s.client_identity(),
        "last_disconnect": s.last_disconnect(),
    }))
}

/// `POST /relay`: send the current pairing code to the operator.
async fn relay(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    let delivered = relay_pairing_code(&state.machine, state.relay.as_ref(), state.relay_timeout)
        .await
        .map_err(|e| {
            warn!("relay request failed: {e}");
            relay_error(&e)
        })?;
    Ok(Json(json!({
        "status": "delivered",
        "message": "Pairing code sent to the operator on Telegram.",
        "code": delivered.code,
        "message_id": delivered.message_id,
    })))
}

/// `POST /logout`: unlink the device and erase the saved session.
async fn logout(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    state.machine.logout().await.map_err(|e| toko_error(&e))?;
    Ok(Json(json!({
        "status": Status::Disconnected.as_str(),
        "message": "Logged out. The saved session was erased.",
    })))
}

/// Build the axum router with shared state.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/start", get(start))
        .route("/qr", get(qr))
        .route("/status", get(status))
        .route("/relay", post(relay))
        .route("/logout", post(logout))
        .with_state(state)
}

/// Serve the API until the process exits.
pub async fn serve(config: ApiConfig, state: ApiState) -> Result<(), TokoError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {addr}");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
