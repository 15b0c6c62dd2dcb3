//! Command handlers behind the `postgate` binary.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use postgate_agents::{run_batch, GroupChat, RunOutcome};
use postgate_llm::{build_llm_client, LlmClient};
use postgate_publish::{build_publisher, PublishMode, Publisher};
use tracing::info;

use crate::cli::{Cli, Commands, ConfigArgs, RunArgs};
use crate::config::PostgateConfig;

const RULE: &str = "==================================================";

pub async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run {
            topic,
            args,
            transcript,
        } => run(topic, &args, transcript.as_deref()).await,
        Commands::Batch { topics, args } => batch(topics, &args).await,
        Commands::CheckConfig { config } => check_config(&config),
    }
}

/// Config file (or defaults) with secrets resolved from the environment.
pub fn load_config(args: &ConfigArgs) -> anyhow::Result<PostgateConfig> {
    let mut config = match &args.config {
        Some(path) => PostgateConfig::from_file(path)?,
        None => PostgateConfig::default(),
    };
    config.resolve_secrets();
    Ok(config)
}

pub fn apply_overrides(config: &mut PostgateConfig, args: &RunArgs) {
    if args.simulate {
        config.publish.mode = PublishMode::Simulated;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.chat.max_rounds = max_rounds;
    }
}

/// Wire the configured oracle and publish endpoint into a group chat.
pub fn build_chat(config: &PostgateConfig) -> anyhow::Result<GroupChat> {
    let oracle = build_llm_client(&config.llm)
        .with_context(|| format!("failed to set up the {} text oracle", config.llm.provider))?;
    let publisher = build_publisher(&config.publish).context("failed to set up publishing")?;
    chat_from_parts(config, oracle, publisher)
}

pub fn chat_from_parts(
    config: &PostgateConfig,
    oracle: Arc<dyn LlmClient>,
    publisher: Arc<dyn Publisher>,
) -> anyhow::Result<GroupChat> {
    let chat = GroupChat::from_config(&config.chat, &config.prompts, oracle, publisher)
        .sampling(config.llm.temperature, config.llm.max_tokens)
        .build()
        .context("invalid chat configuration")?;
    Ok(chat)
}

/// Human-readable report of a single run.
pub fn render_outcome(outcome: &RunOutcome, simulated: bool) -> String {
    match &outcome.published {
        Some(receipt) => {
            let label = if simulated { "SIMULATED POST" } else { "REAL POST" };
            format!(
                "{RULE}\n{label} (id {})\n{RULE}\n{}\n{RULE}",
                receipt.id(),
                receipt.text()
            )
        }
        None => {
            let mut report = format!(
                "No post was published for \"{}\" ({}, gatekeeper {}).",
                outcome.topic, outcome.stop, outcome.state
            );
            if let Some(fault) = &outcome.fault {
                report.push_str(&format!("\nReason: {fault}"));
            }
            report
        }
    }
}

/// One summary line per batch entry.
pub fn render_summary_line(outcome: &RunOutcome) -> String {
    match &outcome.published {
        Some(receipt) => format!(
            "[published] {}: {} {:?}",
            outcome.topic,
            receipt.id(),
            receipt.text()
        ),
        None => format!("[not published] {}: {}", outcome.topic, outcome.stop),
    }
}

fn write_transcript(path: &Path, outcome: &RunOutcome) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write transcript to '{}'", path.display()))?;
    info!(path = %path.display(), messages = outcome.transcript.len(), "Transcript written");
    Ok(())
}

async fn run(
    topic: Option<String>,
    args: &RunArgs,
    transcript: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args);

    let chat = build_chat(&config)?;
    let topic = topic
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| config.chat.default_topic.clone());

    let outcome = chat.run_detailed(&topic).await;
    println!("{}", render_outcome(&outcome, chat.publisher().is_simulated()));

    if let Some(path) = transcript {
        write_transcript(path, &outcome)?;
    }

    Ok(if outcome.is_published() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn batch(topics: Vec<String>, args: &RunArgs) -> anyhow::Result<ExitCode> {
    let mut config = load_config(&args.config)?;
    apply_overrides(&mut config, args);

    let chat = Arc::new(build_chat(&config)?);
    let simulated = chat.publisher().is_simulated();
    let outcomes = run_batch(chat, topics).await;

    if simulated {
        println!("(simulated posting, nothing was sent)");
    }
    for outcome in &outcomes {
        println!("{}", render_summary_line(outcome));
    }

    Ok(if outcomes.iter().all(RunOutcome::is_published) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_config(args: &ConfigArgs) -> anyhow::Result<ExitCode> {
    let config = load_config(args)?;
    println!("{}", config.to_redacted_toml()?);

    let publish_target = match build_publisher(&config.publish) {
        Ok(publisher) if publisher.is_simulated() => "simulated".to_string(),
        Ok(publisher) => publisher.name().to_string(),
        Err(e) => format!("unavailable ({e})"),
    };
    println!("# text oracle key present: {}", config.llm.api_key.is_some());
    println!("# publish target: {publish_target}");
    Ok(ExitCode::SUCCESS)
}
