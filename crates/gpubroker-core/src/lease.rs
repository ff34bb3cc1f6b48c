//! Lease type handed back to claiming users

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An active assignment of one slot to one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Holder of the lease
    pub user_id: String,
    /// Slot the lease refers to
    pub gpu_id: u32,
    /// Streaming port copied from the slot
    pub port: u16,
    /// Pairing code for the streaming client
    pub pin: String,
    /// When the lease was granted
    pub started_at: DateTime<Utc>,
}

impl Lease {
    /// Whether the lease has outlived `timeout` as of `now`.
    ///
    /// A start time in the future never counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        match now.signed_duration_since(self.started_at).to_std() {
            Ok(age) => age > timeout,
            Err(_) => false,
        }
    }
}
