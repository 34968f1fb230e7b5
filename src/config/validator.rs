//! Validation of the updates payload.
//!
//! Catches payloads the control plane would reject anyway, before anything
//! is fetched or registered.

use crate::error::{ConfigError, Result, ShipError};
use tracing::{debug, warn};

use super::patch::{ContainerPatch, TaskPatch};

/// Validator for update payloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatchValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl PatchValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a patch.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, patch: &TaskPatch) -> Result<ValidationResult> {
        let result = self.check(patch);

        for warning in &result.warnings {
            warn!("{warning}");
        }

        match result.errors.first() {
            None => {
                debug!("Updates payload validation passed");
                Ok(result)
            }
            Some(first) => Err(ShipError::Config(ConfigError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }

    /// Runs every check and collects the findings.
    #[must_use]
    pub fn check(&self, patch: &TaskPatch) -> ValidationResult {
        let mut result = ValidationResult::default();

        if patch.is_empty() {
            result
                .warnings
                .push(String::from("The updates payload is empty; nothing will change"));
        }

        Self::validate_task_value("cpu", patch.cpu.as_deref(), &mut result);
        Self::validate_task_value("memory", patch.memory.as_deref(), &mut result);

        for (name, container) in &patch.container_definitions {
            Self::validate_container(name, container, &mut result);
        }

        result
    }

    fn validate_task_value(field: &str, value: Option<&str>, result: &mut ValidationResult) {
        if value.is_some_and(|v| v.trim().is_empty()) {
            result.errors.push(ValidationError {
                field: field.to_string(),
                message: format!("Task {field} cannot be blank"),
            });
        }
    }

    fn validate_container(name: &str, container: &ContainerPatch, result: &mut ValidationResult) {
        let prefix = format!("containerDefinitions.{name}");

        if name.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("containerDefinitions"),
                message: String::from("Container name cannot be empty"),
            });
        }

        for (field, value) in [
            ("cpu", container.cpu),
            ("memory", container.memory),
            ("memoryReservation", container.memory_reservation),
        ] {
            if let Some(value) = value.filter(|v| *v <= 0) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.{field}"),
                    message: format!("Container {field} must be positive, got {value}"),
                });
            }
        }

        if container.image.as_deref().is_some_and(|i| i.trim().is_empty()) {
            result.errors.push(ValidationError {
                field: format!("{prefix}.image"),
                message: String::from("Container image cannot be blank"),
            });
        }

        if container.environment.keys().any(|k| k.trim().is_empty()) {
            result.errors.push(ValidationError {
                field: format!("{prefix}.environment"),
                message: String::from("Environment variable names cannot be empty"),
            });
        }

        if let (Some(reservation), Some(memory)) =
            (container.memory_reservation, container.memory)
        {
            if reservation > memory {
                result.warnings.push(format!(
                    "{prefix}: memoryReservation ({reservation}) is above memory ({memory})"
                ));
            }
        }
    }
}
