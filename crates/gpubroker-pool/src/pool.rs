//! The GPU lease pool

use chrono::{DateTime, Utc};
use gpubroker_core::{slot_port, BrokerError, BrokerResult, Lease, PoolConfig, Slot};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::pin::{PinGenerator, RandomPinGenerator};

/// Slot table and lease table. Both change together under one lock.
struct PoolState {
    /// Slots indexed by id
    slots: Vec<Slot>,
    /// Active leases indexed by user id
    leases: HashMap<String, Lease>,
}

impl PoolState {
    fn vacate(&mut self, gpu_id: u32) {
        if let Some(slot) = self.slots.get_mut(gpu_id as usize) {
            slot.vacate();
        }
    }
}

/// Fixed pool of GPUs handed out as exclusive per-user leases.
///
/// Claim, release and expiry take the write lock; snapshots and counters take
/// the read lock, so readers never see a slot and its lease out of step.
pub struct ResourcePool {
    state: RwLock<PoolState>,
    /// Age after which the sweep reclaims a lease
    lease_timeout: Duration,
    /// Pairing code source
    pins: Arc<dyn PinGenerator>,
}

impl ResourcePool {
    /// Create a pool of `gpu_count` free slots.
    ///
    /// Slot `i` streams on `base_port + i * PORT_STRIDE`. Ports past 65535
    /// clamp to 65535; `PoolConfig::validate` rejects such pools up front.
    pub fn new(gpu_count: u32, base_port: u16, lease_timeout: Duration) -> Self {
        Self::with_pin_generator(
            gpu_count,
            base_port,
            lease_timeout,
            Arc::new(RandomPinGenerator),
        )
    }

    /// Create a pool from daemon configuration
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.gpu_count, config.base_port, config.lease_timeout())
    }

    /// Create a pool with a custom pairing code source
    pub fn with_pin_generator(
        gpu_count: u32,
        base_port: u16,
        lease_timeout: Duration,
        pins: Arc<dyn PinGenerator>,
    ) -> Self {
        let slots: Vec<Slot> = (0..gpu_count)
            .map(|id| Slot::new(id, slot_port(base_port, id).unwrap_or(u16::MAX)))
            .collect();

        info!(
            gpus = gpu_count,
            base_port = base_port,
            lease_timeout_secs = lease_timeout.as_secs(),
            "GPU pool initialized"
        );

        Self {
            state: RwLock::new(PoolState {
                slots,
                leases: HashMap::new(),
            }),
            lease_timeout,
            pins,
        }
    }

    /// Current state of every slot, ordered by id
    pub async fn snapshot(&self) -> Vec<Slot> {
        self.state.read().await.slots.clone()
    }

    /// Lease a GPU to `user_id`.
    ///
    /// A user that already holds a lease gets the same lease back, PIN
    /// included. Otherwise the lowest free slot is taken. Fails with
    /// `ResourceExhausted` when every slot is leased; nothing is queued.
    pub async fn claim(&self, user_id: &str) -> BrokerResult<Lease> {
        let mut state = self.state.write().await;

        if let Some(lease) = state.leases.get(user_id) {
            debug!(
                gpu_id = lease.gpu_id,
                user_id = %user_id,
                "User already holds a lease"
            );
            return Ok(lease.clone());
        }

        let (index, gpu_id, port) = match state
            .slots
            .iter()
            .enumerate()
            .find(|(_, s)| s.available)
        {
            Some((index, slot)) => (index, slot.id, slot.port),
            None => {
                warn!(user_id = %user_id, "No GPU available");
                return Err(BrokerError::ResourceExhausted);
            }
        };

        // The lease is complete before any state changes, so a failing PIN
        // source leaves both tables untouched.
        let now = Utc::now();
        let lease = Lease {
            user_id: user_id.to_string(),
            gpu_id,
            port,
            pin: self.pins.generate(),
            started_at: now,
        };

        state.slots[index].assign(user_id, now);
        state.leases.insert(user_id.to_string(), lease.clone());

        info!(
            gpu_id = lease.gpu_id,
            user_id = %user_id,
            port = lease.port,
            "Assigned GPU"
        );

        Ok(lease)
    }

    /// End the lease held by `user_id` and free its slot
    pub async fn release(&self, user_id: &str) -> BrokerResult<Lease> {
        let mut state = self.state.write().await;

        let lease = state
            .leases
            .remove(user_id)
            .ok_or_else(|| BrokerError::SessionNotFound(user_id.to_string()))?;
        state.vacate(lease.gpu_id);

        info!(gpu_id = lease.gpu_id, user_id = %user_id, "Released GPU");

        Ok(lease)
    }

    /// Reclaim every lease older than the lease timeout as of `now`.
    ///
    /// Returns the reclaimed leases ordered by slot id.
    pub async fn expire_stale(&self, now: DateTime<Utc>) -> Vec<Lease> {
        let mut state = self.state.write().await;

        let stale: Vec<String> = state
            .leases
            .values()
            .filter(|l| l.is_expired(now, self.lease_timeout))
            .map(|l| l.user_id.clone())
            .collect();

        let mut expired = Vec::with_capacity(stale.len());
        for user_id in stale {
            if let Some(lease) = state.leases.remove(&user_id) {
                state.vacate(lease.gpu_id);
                info!(
                    gpu_id = lease.gpu_id,
                    user_id = %user_id,
                    "Expired session"
                );
                expired.push(lease);
            }
        }

        expired.sort_by_key(|l| l.gpu_id);
        expired
    }

    /// The lease currently held by `user_id`, if any
    pub async fn lease_for(&self, user_id: &str) -> Option<Lease> {
        self.state.read().await.leases.get(user_id).cloned()
    }

    /// Number of free slots
    pub async fn available_count(&self) -> usize {
        self.state
            .read()
            .await
            .slots
            .iter()
            .filter(|s| s.available)
            .count()
    }

    /// Number of active leases
    pub async fn lease_count(&self) -> usize {
        self.state.read().await.leases.len()
    }

    /// Total number of slots
    pub async fn slot_count(&self) -> usize {
        self.state.read().await.slots.len()
    }

    pub fn lease_timeout(&self) -> Duration {
        self.lease_timeout
    }
}
