use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// postgate - draft, critique and publish technical posts with a group of LLM agents.
#[derive(Parser, Debug)]
#[command(name = "postgate")]
#[command(version)]
#[command(about = "Draft, critique and publish technical posts with LLM agents.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a TOML config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Never post for real, even when Twitter credentials are configured
    #[arg(long)]
    pub simulate: bool,

    /// Override the turn budget per conversation
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one conversation and publish the approved post
    Run {
        /// Topic to write about (default: chat.default_topic from the config)
        topic: Option<String>,

        #[command(flatten)]
        args: RunArgs,

        /// Write the run outcome and transcript as JSON to this file
        #[arg(long, value_name = "FILE")]
        transcript: Option<PathBuf>,
    },

    /// Run several conversations concurrently, one per topic
    Batch {
        /// Topics to write about
        #[arg(required = true)]
        topics: Vec<String>,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Print the resolved configuration with secrets redacted
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
}
