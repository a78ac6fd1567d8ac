use std::env;
use async_trait::async_trait;
use lambda_runtime::Error;
use reqwest::Client;
use serde_json::Value;

use crate::message::Message;

pub const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";
const SLACK_ENDPOINT: &str = "SLACK_ENDPOINT";

/// Where formatted messages go. One call per message, no retries.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Posts `message` and hands back the API's JSON response.
    async fn post_message(&self, message: &Message) -> Result<Value, Error>;
}

pub struct SlackClient {
    client: Client,
    token: String,
    endpoint: String,
}

impl SlackClient {
    pub fn new(token: String) -> Self {
        let endpoint = env::var(SLACK_ENDPOINT).unwrap_or_else(|_| POST_MESSAGE_URL.to_string());
        Self::with_endpoint(token, endpoint)
    }

    pub fn with_endpoint(token: String, endpoint: String) -> Self {
        Self {
            client: Client::new(),
            token,
            endpoint,
        }
    }
}

#[async_trait]
impl ChatSink for SlackClient {
    async fn post_message(&self, message: &Message) -> Result<Value, Error> {
        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?;
        let body: Value = response.json().await?;
        Ok(body)
    }
}

/// Slack answers HTTP 200 even for rejected calls; the verdict is in `ok`.
pub fn acknowledged(response: &Value) -> bool {
    response.get("ok").and_then(Value::as_bool).unwrap_or(false)
}

#[test]
fn test_acknowledged() {
    assert!(acknowledged(&serde_json::json!({"ok": true, "ts": "1.2"})));
    assert!(!acknowledged(&serde_json::json!({"ok": false, "error": "channel_not_found"})));
    assert!(!acknowledged(&serde_json::json!({})));
}

#[test]
fn test_endpoint_override() {
    env::set_var(SLACK_ENDPOINT, "http://localhost:4010/api/chat.postMessage");
    let overridden = SlackClient::new(String::from("xoxb-test"));
    env::remove_var(SLACK_ENDPOINT);
    assert_eq!(overridden.endpoint, "http://localhost:4010/api/chat.postMessage");
    assert_eq!(SlackClient::new(String::from("xoxb-test")).endpoint, POST_MESSAGE_URL);
}
