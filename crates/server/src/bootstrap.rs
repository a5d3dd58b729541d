use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use voxact_agent::llm::LlmError;
use voxact_agent::runtime::AgentRuntime;
use voxact_core::config::{AppConfig, ConfigError, LoadOptions};

pub struct Application {
    pub config: AppConfig,
    pub runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("llm client construction failed: {0}")]
    Llm(#[from] LlmError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let runtime = AgentRuntime::from_config(&config)?;
    info!(
        event_name = "system.bootstrap.runtime_ready",
        correlation_id = "bootstrap",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "agent runtime constructed"
    );

    Ok(Application { config, runtime: Arc::new(runtime) })
}

#[cfg(test)]
mod tests {
    use voxact_core::config::{ConfigOverrides, LlmProvider, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[test]
    fn bootstrap_fails_fast_without_required_llm_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                llm_provider: Some(LlmProvider::OpenAi),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("openai without a key must not bootstrap").to_string();
        assert!(message.contains("llm.api_key"));
    }

    #[test]
    fn bootstrap_succeeds_with_the_default_local_provider() {
        let app = bootstrap(LoadOptions::default()).expect("default config should bootstrap");
        assert_eq!(app.config.routing.classify_timeout_secs, 10);
    }
}
