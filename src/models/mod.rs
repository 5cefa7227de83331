//! Data models for fleet verification
//!
//! This module contains all data structures shared across the engine.

mod command;
mod error;
mod node;
mod outcome;

pub use command::{CommandSpec, ControlResponse};
pub use error::{FailureKind, TaskError};
pub use node::NodeRole;
pub use outcome::{
    AggregateFailure, CommandFailure, NodeReport, NodeState, NodeStatus, RunOutcome,
};
