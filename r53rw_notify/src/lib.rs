pub mod message;
pub mod params;
pub mod slack;

use std::env;
use lambda_runtime::{Error, LambdaEvent};
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::MakeWriter;

pub use message::{build_message, EventKind, Message, MissingFieldError};
pub use slack::{ChatSink, SlackClient};

const SLACK_CHANNEL: &str = "SLACK_CHANNEL";
const TRACING_DEBUG: &str = "TRACING_DEBUG";

pub fn init_tracing() {
    init_tracing_with_writer(std::io::stdout);
}

/// Same setup as `init_tracing`, writing log lines to `writer` instead of
/// stdout.
pub fn init_tracing_with_writer<W>(writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static
{
    tracing_subscriber::fmt()
        .with_max_level(match env::var(TRACING_DEBUG) {
            Ok(_) => tracing::Level::DEBUG,
            Err(_) => tracing::Level::INFO
        })
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .with_writer(writer)
        .init();
}

/// Formats events into chat messages and posts them through a `ChatSink`.
///
/// Built once per process from resolved configuration; handlers borrow it for
/// every invocation.
pub struct Notifier<S: ChatSink> {
    sink: S,
    channel: String,
}

impl Notifier<SlackClient> {
    /// Resolves the Slack token from the parameter store and picks the
    /// channel from `SLACK_CHANNEL`, falling back to the ops channel.
    pub async fn from_env() -> Result<Notifier<SlackClient>, Error> {
        let ssm_client = params::ssm_client().await;
        let token = params::get_parameter(&ssm_client, params::PARAM_SLACK_ACCESS_TOKEN).await?;
        let channel = env::var(SLACK_CHANNEL).unwrap_or_else(|_| message::DEFAULT_CHANNEL.to_string());
        Ok(Notifier::new(SlackClient::new(token), channel))
    }
}

impl<S: ChatSink> Notifier<S> {
    pub fn new(sink: S, channel: String) -> Self {
        Self { sink, channel }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Builds the message for `event` and sends it once. A malformed event is
    /// an error and nothing is sent. A failed or rejected chat call is only
    /// logged and reported as `Ok(false)`.
    ///
    /// There is no deduplication: the same event delivered twice is posted
    /// twice.
    pub async fn format_and_send(&self, event: &Value, kind: EventKind) -> Result<bool, Error> {
        let message = build_message(event, kind, &self.channel)?;
        match self.sink.post_message(&message).await {
            Ok(response) => {
                info!("chat.postMessage response: {}", response);
                if slack::acknowledged(&response) {
                    Ok(true)
                } else {
                    warn!("chat message for {:?} was not accepted", kind);
                    Ok(false)
                }
            }
            Err(e) => {
                error!("error posting chat message for {:?}: {}", kind, e);
                Ok(false)
            }
        }
    }
}

pub async fn function_handler<S: ChatSink>(
    notifier: &Notifier<S>,
    kind: EventKind,
    event: LambdaEvent<Value>
) -> Result<bool, Error> {
    info!("{:?} event {}, request id {}", kind, event.payload, event.context.request_id);
    notifier.format_and_send(&event.payload, kind).await
}
