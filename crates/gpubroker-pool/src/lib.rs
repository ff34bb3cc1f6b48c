//! gpubroker-pool: GPU lease pool for gpubroker
//!
//! This crate owns the broker's only mutable state:
//! - The fixed slot table and the per-user lease table
//! - Claim, release and expiry of leases
//! - Pairing PIN generation
//! - The background sweep that reclaims stale leases

pub mod pin;
pub mod pool;
pub mod sweeper;

pub use pin::{PinGenerator, RandomPinGenerator};
pub use pool::ResourcePool;
pub use sweeper::{spawn_sweeper, SWEEP_INTERVAL};
