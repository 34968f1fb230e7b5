//! Change planning for task definitions.
//!
//! This module applies a [`TaskPatch`](crate::config::TaskPatch) to a task
//! definition template and records, field by field, what the patch changed.

mod apply;
mod diff;

pub use apply::apply;
pub use diff::{ContainerDiff, DiffValue, ScalarDiff, TaskDiff};
