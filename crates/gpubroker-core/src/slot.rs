//! GPU slots in the broker's fixed pool

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Port distance between consecutive slots.
///
/// Each slot owns the range `port..port + PORT_STRIDE` so the streaming
/// server behind it can bind its companion ports.
pub const PORT_STRIDE: u16 = 10;

/// One leasable GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Stable slot index, `0..N`
    pub id: u32,
    /// Whether the slot can be claimed
    pub available: bool,
    /// Current lease holder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// When the current lease started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_start: Option<DateTime<Utc>>,
    /// First port of the slot's streaming range
    pub port: u16,
}

impl Slot {
    /// Create a free slot
    pub fn new(id: u32, port: u16) -> Self {
        Self {
            id,
            available: true,
            user_id: None,
            session_start: None,
            port,
        }
    }

    /// Hand the slot to `user_id`
    pub fn assign(&mut self, user_id: &str, at: DateTime<Utc>) {
        self.available = false;
        self.user_id = Some(user_id.to_string());
        self.session_start = Some(at);
    }

    /// Return the slot to the free list
    pub fn vacate(&mut self) {
        self.available = true;
        self.user_id = None;
        self.session_start = None;
    }

    /// True when `available` and the holder fields agree
    pub fn is_consistent(&self) -> bool {
        if self.available {
            self.user_id.is_none() && self.session_start.is_none()
        } else {
            self.user_id.is_some() && self.session_start.is_some()
        }
    }
}

/// Port assigned to slot `id`, or `None` if it does not fit in a `u16`
pub fn slot_port(base_port: u16, id: u32) -> Option<u16> {
    let offset = id.checked_mul(u32::from(PORT_STRIDE))?;
    let port = u32::from(base_port).checked_add(offset)?;
    u16::try_from(port).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_and_vacate() {
        let mut slot = Slot::new(0, 47984);
        assert!(slot.is_consistent());

        slot.assign("alice", Utc::now());
        assert!(!slot.available);
        assert_eq!(slot.user_id.as_deref(), Some("alice"));
        assert!(slot.is_consistent());

        slot.vacate();
        assert!(slot.available);
        assert_eq!(slot, Slot::new(0, 47984));
    }

    #[test]
    fn test_slot_port() {
        assert_eq!(slot_port(47984, 0), Some(47984));
        assert_eq!(slot_port(47984, 1), Some(47994));
        assert_eq!(slot_port(65530, 1), None);
        assert_eq!(slot_port(1000, u32::MAX), None);
    }

    #[test]
    fn test_free_slot_omits_holder_fields() {
        let json = serde_json::to_value(Slot::new(1, 47994)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "id": 1, "available": true, "port": 47994 })
        );
    }

    #[test]
    fn test_leased_slot_serializes_holder() {
        let mut slot = Slot::new(0, 47984);
        slot.assign("bob", Utc::now());
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["user_id"], "bob");
        assert!(json["session_start"].is_string());
    }
}
