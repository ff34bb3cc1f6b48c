//! gpubroker-api: HTTP API for gpubroker
//!
//! This crate exposes the GPU pool over HTTP:
//! - Pool status
//! - Claiming and releasing leases
//! - Optional static dashboard

pub mod error;
pub mod rest;
pub mod server;

pub use error::ApiError;
pub use rest::create_router;
pub use server::serve;
