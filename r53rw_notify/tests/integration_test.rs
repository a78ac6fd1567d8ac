use std::future::Future;
use std::sync::Mutex;
use async_trait::async_trait;
use lambda_runtime::{Context, Error, LambdaEvent};
use r53rw_notify::{build_message, function_handler, ChatSink, EventKind, Message, Notifier, SlackClient};
use r53rw_notify::message::{NEUTRAL_COLOR, WARNING_COLOR};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

struct RecordingSink {
    sent: Mutex<Vec<Message>>,
    response: Result<Value, String>,
}

impl RecordingSink {
    fn answering(response: Value) -> Self {
        RecordingSink { sent: Mutex::new(vec![]), response: Ok(response) }
    }

    fn failing(reason: &str) -> Self {
        RecordingSink { sent: Mutex::new(vec![]), response: Err(reason.to_string()) }
    }

    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn post_message(&self, message: &Message) -> Result<Value, Error> {
        self.sent.lock().unwrap().push(message.clone());
        match &self.response {
            Ok(v) => Ok(v.clone()),
            Err(reason) => Err(Error::from(reason.as_str())),
        }
    }
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn notifier(sink: RecordingSink) -> Notifier<RecordingSink> {
    Notifier::new(sink, String::from("#_notice_ops"))
}

#[test]
fn test_build_failure_alert() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": true})));
    let event = json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "FAILED"}});
    let sent = block_on(notifier.format_and_send(&event, EventKind::BuildAlert)).unwrap();
    assert!(sent);
    let messages = notifier.sink().sent();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].body(), Some("project-name - p1\nbuild-id - b1\nbuild-status - FAILED"));
    assert_eq!(messages[0].color(), Some(WARNING_COLOR));
}

#[test]
fn test_zone_change_notice() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": true})));
    let event = json!({"detail": {"requestParameters": {"hostedZoneId": "Z1"}}});
    block_on(notifier.format_and_send(&event, EventKind::ZoneChange)).unwrap();
    let messages = notifier.sink().sent();
    assert_eq!(messages[0].body(), Some(json!({"hostedZoneId": "Z1"}).to_string().as_str()));
    assert_eq!(messages[0].color(), Some(NEUTRAL_COLOR));
}

#[test]
fn test_redelivered_event_is_sent_twice() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": true})));
    let event = json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "SUCCEEDED"}});
    block_on(notifier.format_and_send(&event, EventKind::BuildNotice)).unwrap();
    block_on(notifier.format_and_send(&event, EventKind::BuildNotice)).unwrap();
    let messages = notifier.sink().sent();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], messages[1]);
}

#[test]
fn test_malformed_event_sends_nothing() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": true})));
    let event = json!({"detail": {"build-id": "b1"}});
    let res = block_on(notifier.format_and_send(&event, EventKind::BuildAlert));
    assert!(res.is_err());
    assert!(notifier.sink().sent().is_empty());
}

#[test]
fn test_rejected_send_is_not_a_failure() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": false, "error": "invalid_auth"})));
    let event = json!({"detail": {"requestParameters": {"hostedZoneId": "Z1"}}});
    let sent = block_on(notifier.format_and_send(&event, EventKind::ZoneChange)).unwrap();
    assert!(!sent);
    assert_eq!(notifier.sink().sent().len(), 1);
}

#[test]
fn test_transport_error_is_logged_only() {
    let notifier = notifier(RecordingSink::failing("connection refused"));
    let event = json!({"detail": {"requestParameters": {}}});
    let sent = block_on(notifier.format_and_send(&event, EventKind::ZoneChange)).unwrap();
    assert!(!sent);
}

#[test]
fn test_function_handler() {
    let notifier = notifier(RecordingSink::answering(json!({"ok": true})));
    let event = LambdaEvent {
        payload: json!({
            "source": "aws.codebuild",
            "detail-type": "CodeBuild Build State Change",
            "detail": {"project-name": "r53rw-export", "build-id": "arn:aws:codebuild:b", "build-status": "FAILED"}
        }),
        context: Context::default()
    };
    let res = block_on(function_handler(&notifier, EventKind::BuildAlert, event)).unwrap();
    assert!(res);
    assert_eq!(notifier.sink().sent()[0].text, "R53RW CodeBuild Alert");
}

struct CapturedRequest {
    head: String,
    body: Value,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.head.lines()
            .skip(1)
            .filter_map(|line| line.split_once(':'))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
            .map(|(_, value)| value.trim())
    }
}

// Accepts one HTTP request, records it and answers with `reply` as JSON.
async fn answer_once(listener: TcpListener, reply: Value) -> CapturedRequest {
    let (mut socket, _) = listener.accept().await.unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let request = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before the request was complete");
        buf.extend_from_slice(&chunk[..n]);
        let end = match buf.windows(4).position(|w| w == b"\r\n\r\n") {
            Some(end) => end,
            None => continue,
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_string();
        let partial = CapturedRequest { head, body: Value::Null };
        let length: usize = partial.header("content-length").unwrap().parse().unwrap();
        if buf.len() >= end + 4 + length {
            let body = serde_json::from_slice(&buf[end + 4..end + 4 + length]).unwrap();
            break CapturedRequest { body, ..partial };
        }
    };

    let reply = reply.to_string();
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        reply.len(),
        reply
    );
    socket.write_all(response.as_bytes()).await.unwrap();
    socket.shutdown().await.unwrap();
    request
}

#[test]
fn test_slack_client_posts_message_with_bearer_token() {
    block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/chat.postMessage", listener.local_addr().unwrap());
        let server = tokio::spawn(answer_once(listener, json!({"ok": true, "ts": "1700000000.000100"})));

        let client = SlackClient::with_endpoint(String::from("xoxb-test"), endpoint);
        let event = json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "FAILED"}});
        let message = build_message(&event, EventKind::BuildAlert, "#_notice_ops").unwrap();
        let response = client.post_message(&message).await.unwrap();
        let request = server.await.unwrap();

        assert!(request.head.starts_with("POST /api/chat.postMessage HTTP/1.1"));
        assert_eq!(request.header("authorization"), Some("Bearer xoxb-test"));
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.body, serde_json::to_value(&message).unwrap());
        assert_eq!(request.body["channel"], "#_notice_ops");
        assert_eq!(response["ok"], true);
        assert_eq!(response["ts"], "1700000000.000100");
    });
}

#[test]
fn test_notifier_over_http_reports_rejection() {
    block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/chat.postMessage", listener.local_addr().unwrap());
        let server = tokio::spawn(answer_once(listener, json!({"ok": false, "error": "invalid_auth"})));

        let notifier = Notifier::new(
            SlackClient::with_endpoint(String::from("xoxb-revoked"), endpoint),
            String::from("#_notice_ops")
        );
        let event = json!({"detail": {"project-name": "p1", "build-id": "b1", "build-status": "SUCCEEDED"}});
        let sent = notifier.format_and_send(&event, EventKind::BuildNotice).await.unwrap();
        let request = server.await.unwrap();

        assert!(!sent);
        assert_eq!(request.header("authorization"), Some("Bearer xoxb-revoked"));
        assert_eq!(request.body["text"], "CodeBuild Notification");
    });
}
