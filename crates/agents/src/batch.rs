//! Concurrent runs over several topics.
//!
//! Each topic gets its own tokio task and, through [`GroupChat::run_detailed`],
//! its own conversation and gatekeeper. The oracle and publisher are shared.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::chat::{GroupChat, RunOutcome};

/// Run every topic concurrently. Outcomes come back in input order.
pub async fn run_batch<I, S>(chat: Arc<GroupChat>, topics: I) -> Vec<RunOutcome>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let start_time = Instant::now();
    let topics: Vec<String> = topics.into_iter().map(Into::into).collect();

    info!(chat = %chat.name(), topics = topics.len(), "Starting batch");

    let mut handles = Vec::with_capacity(topics.len());
    for topic in &topics {
        let chat = chat.clone();
        let topic = topic.clone();
        handles.push(tokio::spawn(async move { chat.run_detailed(&topic).await }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (topic, handle) in topics.into_iter().zip(handles) {
        match handle.await {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                error!(chat = %chat.name(), topic = %topic, error = %e, "Run task join error");
                outcomes.push(RunOutcome::aborted(topic, e.to_string()));
            }
        }
    }

    info!(
        chat = %chat.name(),
        runs = outcomes.len(),
        published = outcomes.iter().filter(|o| o.is_published()).count(),
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Batch completed"
    );

    outcomes
}
