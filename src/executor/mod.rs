//! Task execution engine
//!
//! Fans verification work out across nodes and runs each node's flow.

mod parallel;
mod runner;

pub use parallel::ParallelExecutor;
pub use runner::VerificationRunner;
