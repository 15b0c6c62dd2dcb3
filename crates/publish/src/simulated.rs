use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use postgate_common::{PostgateError, Result};
use tracing::warn;

use crate::endpoint::{PublishReceipt, Publisher};

/// Stand-in endpoint for runs without platform credentials.
///
/// Always succeeds and hands out ids `sim-1`, `sim-2`, ...
#[derive(Debug, Default)]
pub struct SimulatedPublisher {
    published: AtomicU64,
}

impl SimulatedPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful publishes so far.
    pub fn publish_count(&self) -> u64 {
        self.published.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for SimulatedPublisher {
    async fn publish(&self, text: &str) -> Result<PublishReceipt> {
        if text.trim().is_empty() {
            return Err(PostgateError::Publish("refusing to post empty text".to_string()));
        }
        let n = self.published.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(chars = text.chars().count(), id = n, "Simulating post, nothing was sent");
        PublishReceipt::new(format!("sim-{n}"), text)
    }

    fn name(&self) -> &str {
        "simulated"
    }

    fn is_simulated(&self) -> bool {
        true
    }
}
