//! gearctl - deploy archives to PaaS gears through Git.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_json);

    if let Err(e) = cli.run().await {
        gearctl::error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}

/// `RUST_LOG` wins over `GEARPUSH_LOG_LEVEL`. Logs go to stderr so command
/// output stays parseable.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        std::env::var("GEARPUSH_LOG_LEVEL")
            .unwrap_or_else(|_| "info".to_string())
            .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
