use voxact_agent::runtime::AgentRuntime;
use voxact_core::config::{AppConfig, LoadOptions};

use super::CommandResult;

pub fn run(prompt: &str) -> CommandResult {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return CommandResult::failure("ask", "empty_prompt", "prompt must not be empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("ask", "config_validation", error.to_string(), 2)
        }
    };

    let runtime = match AgentRuntime::from_config(&config) {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure("ask", "runtime_construction", error.to_string(), 2)
        }
    };

    let tokio_runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(tokio_runtime) => tokio_runtime,
        Err(error) => return CommandResult::failure("ask", "async_runtime", error.to_string(), 2),
    };

    match tokio_runtime.block_on(runtime.execute_prompt(trimmed)) {
        Ok(actions) => {
            let payload = serde_json::json!({ "actions_list": actions });
            let output = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|error| format!("{{\"error\":\"{error}\"}}"));
            CommandResult { exit_code: 0, output }
        }
        Err(batch_error) => {
            CommandResult::failure("ask", "no_result", batch_error.user_message(), 1)
        }
    }
}
