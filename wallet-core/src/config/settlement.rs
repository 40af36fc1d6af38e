use crate::events::{DEFAULT_SUBSCRIBER_CAPACITY, PublishPolicy};
use serde::{Deserialize, Serialize};

/// Tuning for the transfer hand-off and balance writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Queue size of each event bus subscription.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Behavior of a publish that finds a full subscriber queue.
    #[serde(default)]
    pub publish_policy: PublishPolicy,
    /// How many times an account write is retried after a version conflict.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
    /// Re-publish outbox entries left over from a previous run.
    #[serde(default = "default_recover_on_startup")]
    pub recover_on_startup: bool,
}

fn default_queue_capacity() -> usize {
    DEFAULT_SUBSCRIBER_CAPACITY
}

fn default_max_conflict_retries() -> u32 {
    5
}

fn default_recover_on_startup() -> bool {
    true
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            publish_policy: PublishPolicy::default(),
            max_conflict_retries: default_max_conflict_retries(),
            recover_on_startup: default_recover_on_startup(),
        }
    }
}
