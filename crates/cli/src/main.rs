//! postgate binary.
//!
//! Usage:
//!   postgate run "event sourcing"
//!   postgate run --config postgate.toml --simulate --transcript run.json
//!   postgate batch caching queues sharding
//!   postgate check-config --config postgate.toml
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY` / `GOOGLE_API_KEY` - Gemini key (default provider)
//! - `OPENAI_API_KEY`, `ANTHROPIC_API_KEY` - keys for the other providers
//! - `TWITTER_API_KEY`, `TWITTER_API_SECRET`, `TWITTER_ACCESS_TOKEN`,
//!   `TWITTER_ACCESS_TOKEN_SECRET` - real posting; without them posts are simulated
//! - `RUST_LOG` - log filter (default: info,postgate=debug)

use std::process::ExitCode;

use clap::Parser;
use postgate_cli::{execute, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,postgate=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
