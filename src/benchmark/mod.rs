//! Remote benchmark jobs
//!
//! Typed benchmark parameters and the detached launch/join of one
//! benchmark process per client node.

mod launcher;
mod params;

pub use launcher::{DetachedJobLauncher, JobExit, JobHandle, JobSet};
pub use params::{BenchParams, Distribution, FaultInjection, InjectionMode};
