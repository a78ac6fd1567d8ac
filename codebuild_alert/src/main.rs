use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use r53rw_notify::{function_handler, init_tracing, EventKind, Notifier};
use serde_json::Value;

/// Posts failed export builds to Slack.
#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let notifier = Notifier::from_env().await?;
    let notifier = &notifier;
    run(service_fn(move |event: LambdaEvent<Value>| async move {
        function_handler(notifier, EventKind::BuildAlert, event).await
    })).await
}
