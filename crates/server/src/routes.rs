//! Action-generation endpoints.
//!
//! - `POST /execute`: classify a prompt and run its intents
//! - `POST /execute-voice-command`: same pipeline for transcribed speech,
//!   with optional webhook delivery of the outcome

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use uuid::Uuid;

use voxact_agent::runtime::AgentRuntime;
use voxact_core::errors::BatchError;

#[derive(Clone)]
pub struct ApiState {
    pub runtime: Arc<AgentRuntime>,
    pub http: reqwest::Client,
    pub callback_timeout: Duration,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct VoiceCommandRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub callback_url: Option<String>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/execute", post(execute))
        .route("/execute-voice-command", post(execute_voice_command))
        .layer(cors)
        .with_state(state)
}

pub async fn execute(
    State(state): State<ApiState>,
    Json(request): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    let correlation_id = Uuid::new_v4();
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "Empty prompt"})));
    }

    info!(
        event_name = "ingress.execute.received",
        correlation_id = %correlation_id,
        "execute request received"
    );

    let (status, body) = run_pipeline(&state, &prompt, correlation_id).await;
    (status, Json(body))
}

pub async fn execute_voice_command(
    State(state): State<ApiState>,
    Json(request): Json<VoiceCommandRequest>,
) -> (StatusCode, Json<Value>) {
    let correlation_id = Uuid::new_v4();
    let prompt = request.prompt.trim().to_string();

    if prompt.is_empty() {
        let body = json!({"error": "Empty prompt"});
        if let Some(callback_url) = &request.callback_url {
            deliver_callback(&state, callback_url, &body, correlation_id).await;
        }
        return (StatusCode::BAD_REQUEST, Json(body));
    }

    info!(
        event_name = "ingress.voice_command.received",
        correlation_id = %correlation_id,
        has_callback = request.callback_url.is_some(),
        "voice command received"
    );

    let (status, body) = run_pipeline(&state, &prompt, correlation_id).await;

    // The webhook is an additional delivery channel; the direct HTTP
    // response is returned whether or not delivery succeeds.
    if let Some(callback_url) = &request.callback_url {
        deliver_callback(&state, callback_url, &body, correlation_id).await;
    }

    (status, Json(body))
}

async fn run_pipeline(
    state: &ApiState,
    prompt: &str,
    correlation_id: Uuid,
) -> (StatusCode, Value) {
    match state.runtime.execute_prompt(prompt).await {
        Ok(actions) => {
            info!(
                event_name = "ingress.execute.completed",
                correlation_id = %correlation_id,
                actions = actions.len(),
                "action payloads produced"
            );
            (StatusCode::OK, json!({"actions_list": actions}))
        }
        Err(batch_error) => {
            warn!(
                event_name = "ingress.execute.no_result",
                correlation_id = %correlation_id,
                error = %batch_error,
                "batch produced no result"
            );
            let status = match batch_error {
                BatchError::IntentNotRecognized => StatusCode::BAD_REQUEST,
                BatchError::NoActionsProduced => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, json!({"error": batch_error.user_message()}))
        }
    }
}

async fn deliver_callback(state: &ApiState, callback_url: &str, body: &Value, correlation_id: Uuid) {
    let delivery = state
        .http
        .post(callback_url)
        .json(body)
        .timeout(state.callback_timeout)
        .send()
        .await;

    match delivery {
        Ok(response) => info!(
            event_name = "egress.callback.delivered",
            correlation_id = %correlation_id,
            status = response.status().as_u16(),
            "callback delivered"
        ),
        Err(delivery_error) => error!(
            event_name = "egress.callback.failed",
            correlation_id = %correlation_id,
            error = %delivery_error,
            "callback delivery failed; falling back to the direct response"
        ),
    }
}
