use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use voxact_cli::commands::{ask, config, doctor};

const MANAGED_VARS: &[&str] = &[
    "VOXACT_LLM_PROVIDER",
    "VOXACT_LLM_API_KEY",
    "VOXACT_LLM_BASE_URL",
    "VOXACT_LLM_MODEL",
    "VOXACT_YOUTUBE_API_KEY",
    "VOXACT_LOGGING_LEVEL",
    "VOXACT_LOG_LEVEL",
];

#[test]
fn config_lists_effective_values_with_default_sources() {
    with_env(&[], || {
        let output = config::run();

        assert!(output.contains("effective config"));
        assert!(output.contains("- llm.provider = Ollama (source: default)"));
        assert!(output.contains("- routing.arbitration = First (source: default)"));
        assert!(output.contains("- llm.api_key = <unset>"));
    });
}

#[test]
fn config_attributes_env_sourced_values() {
    with_env(&[("VOXACT_LLM_MODEL", "mistral")], || {
        let output = config::run();
        assert!(output.contains("- llm.model = mistral (source: env (VOXACT_LLM_MODEL))"));
    });
}

#[test]
fn config_redacts_configured_secrets() {
    with_env(&[("VOXACT_YOUTUBE_API_KEY", "yt-very-secret")], || {
        let output = config::run();
        assert!(output.contains("- youtube.api_key = <redacted>"));
        assert!(!output.contains("yt-very-secret"));
    });
}

#[test]
fn doctor_passes_with_the_default_local_provider() {
    with_env(&[], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "pass");
        assert_eq!(checks[2]["name"], "youtube_tool");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn doctor_fails_when_config_validation_fails() {
    with_env(&[("VOXACT_LLM_PROVIDER", "openai")], || {
        let payload = parse_payload(&doctor::run(true));

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks[0]["status"], "fail");
        assert_eq!(checks[1]["status"], "skipped");
    });
}

#[test]
fn ask_rejects_empty_prompts() {
    with_env(&[], || {
        let result = ask::run("   ");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "empty_prompt");
    });
}

#[test]
fn ask_surfaces_config_failures_before_any_model_call() {
    with_env(&[("VOXACT_LLM_PROVIDER", "openai")], || {
        let result = ask::run("play something");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

fn env_lock() -> &'static Mutex<()> {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

fn with_env(vars: &[(&str, &str)], run: impl FnOnce()) {
    let _guard = env_lock().lock().expect("env lock should not be poisoned");

    for var in MANAGED_VARS {
        env::remove_var(var);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    run();

    for (key, _) in vars {
        env::remove_var(key);
    }
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}
