//! Library side of the `postgate` binary: argument parsing, configuration
//! loading and the command handlers.

pub mod cli;
pub mod commands;
pub mod config;

pub use cli::{Cli, Commands, ConfigArgs, RunArgs};
pub use commands::{
    apply_overrides, build_chat, chat_from_parts, execute, load_config, render_outcome,
    render_summary_line,
};
pub use config::PostgateConfig;
