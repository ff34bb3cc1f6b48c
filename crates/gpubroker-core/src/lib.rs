//! gpubroker-core: Core types for the gpubroker control plane
//!
//! This crate provides the types shared by every gpubroker crate:
//! - GPU slots and the leases handed out on them
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod lease;
pub mod slot;

pub use config::*;
pub use error::*;
pub use lease::*;
pub use slot::*;
