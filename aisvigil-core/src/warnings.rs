//! Warning deduplication ledger
//!
//! Safety broadcasts must not be repeated while a previous issuance of the
//! same message id is still fresh; a SART that keeps transmitting would
//! otherwise flood the outbound channel every few seconds.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Re-issuing a warning id within this window is suppressed
pub const WARNING_REPEAT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// One issued warning
#[derive(Debug, Clone, PartialEq)]
pub struct WarningEntry {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Deduplication table message-id -> latest issuance.
///
/// The check-then-insert is atomic under the ledger's own lock; callers do
/// not need to hold any other mutex around it.
#[derive(Debug, Default)]
pub struct WarningLedger {
    entries: RwLock<HashMap<String, WarningEntry>>,
}

impl WarningLedger {
    pub fn new() -> Self {
        WarningLedger::default()
    }

    /// Record `message_id` as issued at `now` unless a previous issuance is
    /// still within [`WARNING_REPEAT_TIMEOUT`]. Returns whether the caller
    /// should go ahead and send.
    pub fn should_send(&self, message_id: &str, text: &str, now: DateTime<Utc>) -> bool {
        let repeat_after = ChronoDuration::seconds(WARNING_REPEAT_TIMEOUT.as_secs() as i64);

        let mut entries = self.entries.write().unwrap();
        if let Some(entry) = entries.get(message_id) {
            if entry.timestamp + repeat_after > now {
                log::debug!(
                    "Warning '{}' suppressed, last issued {}",
                    message_id,
                    entry.timestamp
                );
                return false;
            }
        }
        entries.insert(
            message_id.to_string(),
            WarningEntry {
                text: text.to_string(),
                timestamp: now,
            },
        );
        true
    }

    /// Latest issuance of a message id, if any
    pub fn get(&self, message_id: &str) -> Option<WarningEntry> {
        self.entries.read().unwrap().get(message_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Forget all issuances; the next `should_send` for any id fires
    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}
