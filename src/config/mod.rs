//! Configuration module for the updates payload.
//!
//! This module handles everything about the overrides to deploy:
//! - The payload shape (`TaskPatch`, `ContainerPatch`)
//! - Loading it from a file or standard input
//! - Validation of its values

mod parser;
mod patch;
mod validator;

pub use parser::{PatchParser, STDIN_SOURCE};
pub use patch::{ContainerPatch, TaskPatch};
pub use validator::{PatchValidator, ValidationError, ValidationResult};
