use std::fmt::{Display, Formatter};
use lambda_runtime::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CHANNEL: &str = "#_notice_ops";
pub const USERNAME: &str = "api.cloud3rs.io";
pub const ICON_EMOJI: &str = ":dart:";
pub const NEUTRAL_COLOR: &str = "#808080";
pub const WARNING_COLOR: &str = "#ff4500";

const DETAIL: &str = "detail";
const REQUEST_PARAMETERS: &str = "requestParameters";
const PROJECT_NAME: &str = "project-name";
const BUILD_ID: &str = "build-id";
const BUILD_STATUS: &str = "build-status";

/// Which kind of event a handler was wired to. Decides the title, the color
/// and which `detail` fields the message text is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ZoneChange,
    BuildNotice,
    BuildAlert,
}

impl EventKind {
    pub fn title(&self) -> &'static str {
        match self {
            EventKind::ZoneChange => "R53RW Notification",
            EventKind::BuildNotice => "CodeBuild Notification",
            EventKind::BuildAlert => "R53RW CodeBuild Alert",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            EventKind::BuildAlert => WARNING_COLOR,
            _ => NEUTRAL_COLOR,
        }
    }
}

#[derive(Debug)]
pub struct MissingFieldError {
    pub path: String
}

impl std::error::Error for MissingFieldError {}

impl Display for MissingFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "event is missing field {}", self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub text: String,
    pub username: String,
    pub icon_emoji: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub color: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: TextObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub text_type: String,
    pub text: String,
}

impl Message {
    pub fn new(channel: &str, kind: EventKind, body: String) -> Message {
        Message {
            channel: channel.to_string(),
            text: kind.title().to_string(),
            username: USERNAME.to_string(),
            icon_emoji: ICON_EMOJI.to_string(),
            attachments: vec![Attachment {
                color: kind.color().to_string(),
                blocks: vec![Block {
                    block_type: "section".to_string(),
                    text: TextObject {
                        text_type: "mrkdwn".to_string(),
                        text: body,
                    },
                }],
            }],
        }
    }

    /// Text of the single section block.
    pub fn body(&self) -> Option<&str> {
        self.attachments.first()
            .and_then(|a| a.blocks.first())
            .map(|b| b.text.text.as_str())
    }

    pub fn color(&self) -> Option<&str> {
        self.attachments.first().map(|a| a.color.as_str())
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, Error> {
    let mut current = value;
    for (i, key) in path.iter().enumerate() {
        current = current.get(*key).ok_or_else(|| MissingFieldError {
            path: path[..=i].join("."),
        })?;
    }
    Ok(current)
}

// Strings go in bare, everything else as compact JSON.
fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_owned(),
        other => other.to_string(),
    }
}

/// Builds the message for `event`. Every field the kind needs is looked up
/// before anything is assembled, so a malformed event never yields a partial
/// message.
pub fn build_message(event: &Value, kind: EventKind, channel: &str) -> Result<Message, Error> {
    let body = match kind {
        EventKind::ZoneChange => field_text(lookup(event, &[DETAIL, REQUEST_PARAMETERS])?),
        EventKind::BuildNotice | EventKind::BuildAlert => {
            let project = field_text(lookup(event, &[DETAIL, PROJECT_NAME])?);
            let build_id = field_text(lookup(event, &[DETAIL, BUILD_ID])?);
            let status = field_text(lookup(event, &[DETAIL, BUILD_STATUS])?);
            format!("project-name - {}\nbuild-id - {}\nbuild-status - {}", project, build_id, status)
        }
    };
    Ok(Message::new(channel, kind, body))
}

#[test]
fn test_zone_change_uses_request_parameters() {
    let event = serde_json::json!({"detail": {"requestParameters": {"hostedZoneId": "Z1"}}});
    let message = build_message(&event, EventKind::ZoneChange, DEFAULT_CHANNEL).unwrap();
    assert_eq!(message.body(), Some("{\"hostedZoneId\":\"Z1\"}"));
    assert_eq!(message.color(), Some(NEUTRAL_COLOR));
    assert_eq!(message.text, "R53RW Notification");
}

#[test]
fn test_build_alert_text_and_color() {
    let event = serde_json::json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "FAILED"}});
    let message = build_message(&event, EventKind::BuildAlert, DEFAULT_CHANNEL).unwrap();
    assert_eq!(message.body(), Some("project-name - p1\nbuild-id - b1\nbuild-status - FAILED"));
    assert_eq!(message.color(), Some(WARNING_COLOR));
}

#[test]
fn test_build_notice_is_neutral() {
    let event = serde_json::json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "SUCCEEDED"}});
    let message = build_message(&event, EventKind::BuildNotice, "#ops").unwrap();
    assert_eq!(message.color(), Some(NEUTRAL_COLOR));
    assert_eq!(message.channel, "#ops");
    assert_eq!(message.text, "CodeBuild Notification");
}

#[test]
fn test_missing_build_field_is_an_error() {
    let event = serde_json::json!({"detail": {"project-name": "p1", "build-status": "FAILED"}});
    let err = build_message(&event, EventKind::BuildAlert, DEFAULT_CHANNEL).unwrap_err();
    assert_eq!(err.to_string(), "event is missing field detail.build-id");
}

#[test]
fn test_missing_detail_is_an_error() {
    let event = serde_json::json!({"source": "aws.route53"});
    let err = build_message(&event, EventKind::ZoneChange, DEFAULT_CHANNEL).unwrap_err();
    assert!(err.is::<MissingFieldError>());
}

#[test]
fn test_null_request_parameters_still_renders() {
    let event = serde_json::json!({"detail": {"requestParameters": null}});
    let message = build_message(&event, EventKind::ZoneChange, DEFAULT_CHANNEL).unwrap();
    assert_eq!(message.body(), Some("null"));
}

#[test]
fn test_serialized_shape() {
    let message = Message::new("#c", EventKind::BuildAlert, String::from("body"));
    assert_eq!(serde_json::to_value(&message).unwrap(), serde_json::json!({
        "channel": "#c",
        "text": "R53RW CodeBuild Alert",
        "username": "api.cloud3rs.io",
        "icon_emoji": ":dart:",
        "attachments": [{
            "color": "#ff4500",
            "blocks": [{"type": "section", "text": {"type": "mrkdwn", "text": "body"}}]
        }]
    }));
}
