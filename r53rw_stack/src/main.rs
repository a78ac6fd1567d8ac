use std::env;
use std::fs::File;
use std::io;
use r53rw_notify::init_tracing_with_writer;
use r53rw_stack::{build_stack, write_template, Error, StackConfig};
use tracing::info;

/// Synthesizes the CloudFormation template. Writes to the path given as the
/// first argument, or to stdout. Logs go to stderr.
#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing_with_writer(io::stderr);

    let config = StackConfig::load().await?;
    let template = build_stack(&config)?;
    match env::args().nth(1) {
        Some(path) => {
            write_template(&template, &mut File::create(&path)?)?;
            info!("wrote template to {}", path);
        }
        None => write_template(&template, &mut io::stdout().lock())?,
    }
    Ok(())
}
