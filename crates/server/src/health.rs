use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use voxact_core::config::{LlmConfig, LlmProvider};

#[derive(Clone)]
pub struct HealthState {
    llm: LlmConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub llm: HealthCheck,
    pub checked_at: String,
}

pub fn router(llm: LlmConfig) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { llm })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let llm = llm_check(&state.llm);
    let ready = llm.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "voxact-server runtime initialized".to_string(),
        },
        llm,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn llm_check(llm: &LlmConfig) -> HealthCheck {
    let configured = match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Anthropic => llm.api_key.is_some(),
        LlmProvider::Ollama => llm.base_url.is_some(),
    };

    if configured {
        HealthCheck {
            status: "ready",
            detail: format!("{:?} provider configured with model {}", llm.provider, llm.model),
        }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "llm provider credentials are missing".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use voxact_core::config::{AppConfig, LlmProvider};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_the_llm_is_configured() {
        let llm = AppConfig::default().llm;

        let (status, Json(payload)) = health(State(HealthState { llm })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.llm.status, "ready");
        assert_eq!(payload.service.status, "ready");
    }

    #[tokio::test]
    async fn health_degrades_when_provider_credentials_are_missing() {
        let mut llm = AppConfig::default().llm;
        llm.provider = LlmProvider::OpenAi;
        llm.api_key = None;

        let (status, Json(payload)) = health(State(HealthState { llm })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.llm.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
