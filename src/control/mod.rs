//! Control plane access
//!
//! Talking to a node's running service: waiting for its control endpoint
//! to appear and invoking commands through it.

mod client;
mod readiness;

pub use client::ControlChannelClient;
pub use readiness::ReadinessWaiter;
