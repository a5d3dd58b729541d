use std::collections::HashMap;

use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

/// An external lookup a specialist may consult during its turn.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

pub const YOUTUBE_SEARCH_TOOL: &str = "search_youtube_videos";

const YOUTUBE_SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// Searches YouTube's Data API for videos matching a query and returns watch
/// URLs. Registered for the play specialist only when a key is configured.
pub struct YouTubeSearchTool {
    http: reqwest::Client,
    api_key: SecretString,
    max_results: u32,
}

impl YouTubeSearchTool {
    pub fn new(http: reqwest::Client, api_key: SecretString, max_results: u32) -> Self {
        Self { http, api_key, max_results }
    }
}

#[async_trait]
impl Tool for YouTubeSearchTool {
    fn name(&self) -> &'static str {
        YOUTUBE_SEARCH_TOOL
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("search_youtube_videos requires a `query` string"))?;

        let max_results = self.max_results.to_string();
        let response = self
            .http
            .get(YOUTUBE_SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("type", "video"),
                ("maxResults", max_results.as_str()),
                ("q", query),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .context("youtube search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("youtube search returned {status}: {body}"));
        }

        let payload: Value =
            response.json().await.context("youtube search response was not JSON")?;
        Ok(json!({ "urls": watch_urls(&payload) }))
    }
}

/// Pulls watch URLs out of a `search.list` response body.
fn watch_urls(payload: &Value) -> Vec<String> {
    payload
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.pointer("/id/videoId").and_then(Value::as_str))
                .map(|video_id| format!("https://www.youtube.com/watch?v={video_id}"))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{watch_urls, Tool, ToolRegistry};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn registry_resolves_tools_by_name() {
        let mut registry = ToolRegistry::default();
        registry.register(EchoTool);

        assert_eq!(registry.len(), 1);
        let tool = registry.get("echo").expect("echo tool should be registered");
        let output = tool.execute(json!({"query": "hi"})).await.expect("echo should succeed");
        assert_eq!(output, json!({"query": "hi"}));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn extracts_watch_urls_from_search_responses() {
        let payload = json!({
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc123"}},
                {"id": {"kind": "youtube#channel"}},
                {"id": {"kind": "youtube#video", "videoId": "def456"}},
            ]
        });

        assert_eq!(
            watch_urls(&payload),
            vec![
                "https://www.youtube.com/watch?v=abc123",
                "https://www.youtube.com/watch?v=def456",
            ]
        );
    }

    #[test]
    fn missing_items_yield_no_urls() {
        assert!(watch_urls(&json!({})).is_empty());
    }
}
