//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for the queue and settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Minutes budgeted per queue slot (estimated wait = position × slot)
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
    /// How long a writer waits on the SQLite lock before giving up
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Capacity of the background notification queue
    #[serde(default = "default_notification_queue")]
    pub notification_queue: usize,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_slot_minutes() -> u32 {
    15
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_notification_queue() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            slot_minutes: default_slot_minutes(),
            busy_timeout_ms: default_busy_timeout_ms(),
            notification_queue: default_notification_queue(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Bounded exponential backoff for contended write transactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = 2_u64.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, 25, 400)
    }
}
