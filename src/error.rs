//! Error types for the deployment tool.
//!
//! This module provides the error hierarchy for every step of a deployment:
//! payload loading, the ECS control plane, waiting for steady state and the
//! orchestration itself.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for the deployment tool.
#[derive(Debug, Error)]
pub enum ShipError {
    /// Configuration payload errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// ECS control plane errors.
    #[error("ECS error: {0}")]
    Ecs(#[from] EcsError),

    /// Errors raised while waiting for steady state.
    #[error("{0}")]
    Wait(#[from] WaitError),

    /// Orchestration errors.
    #[error("Deployment error: {0}")]
    Deploy(#[from] DeployError),
}

/// Configuration payload errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The payload file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The payload could not be read.
    #[error("Unable to read {source_name}: {message}")]
    ReadFailed {
        /// Where the payload was read from (a path or `stdin`).
        source_name: String,
        /// Description of the read failure.
        message: String,
    },

    /// The payload could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// ECS control plane errors.
#[derive(Debug, Error)]
pub enum EcsError {
    /// No service matched the lookup.
    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound {
        /// Cluster that was searched.
        cluster: String,
        /// Requested service name.
        service: String,
    },

    /// More than one service matched the lookup.
    #[error("{count} services named {service} found in cluster {cluster}")]
    AmbiguousService {
        /// Cluster that was searched.
        cluster: String,
        /// Requested service name.
        service: String,
        /// Number of matching services.
        count: usize,
    },

    /// The task definition could not be found.
    #[error("task definition {reference} not found")]
    TaskDefinitionNotFound {
        /// ARN or family:revision that was requested.
        reference: String,
    },

    /// A remote call failed.
    #[error("unable to {operation}: {message}")]
    RequestFailed {
        /// The operation that failed, e.g. `describe services`.
        operation: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// The control plane answered with something unusable.
    #[error("invalid response from ECS: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// Errors raised while waiting for a service to reach steady state.
#[derive(Debug, Error)]
pub enum WaitError {
    /// No PRIMARY deployment to anchor event correlation on.
    #[error("we could not find a primary deployment for service {service}")]
    NoPrimaryDeployment {
        /// Service name.
        service: String,
    },

    /// The deadline passed before the service looked good.
    #[error("{}", timeout_message(.errors))]
    Timeout {
        /// Service name.
        service: String,
        /// How long we waited.
        timeout: Duration,
        /// Correlated failure events, already formatted.
        errors: Vec<String>,
    },

    /// The wait was cancelled by the caller.
    #[error("stopped waiting for service {service}: cancelled")]
    Cancelled {
        /// Service name.
        service: String,
    },
}

/// Orchestration errors.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A required argument was missing.
    #[error("{field} was not provided")]
    InvalidInput {
        /// Name of the missing argument.
        field: &'static str,
    },

    /// The compensating update failed.
    #[error("failed to roll back the service: {message}")]
    RollbackFailed {
        /// Description of the rollback failure.
        message: String,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, ShipError>;

fn timeout_message(errors: &[String]) -> String {
    let mut lines =
        vec!["We ran into a timeout while waiting for the service to reach steady state"];
    if errors.is_empty() {
        lines.push("We found no errors, so consider just increasing the timeout you're using");
        lines.push("(or maybe the service doesn't have logging setup correctly)");
    } else {
        lines.push("We found the following errors while trying to get your service up:");
        lines.extend(errors.iter().map(String::as_str));
    }
    lines.join("\n")
}

impl ShipError {
    /// Returns true if this is a wait timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Wait(WaitError::Timeout { .. }))
    }

    /// Returns true if the operation was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Wait(WaitError::Cancelled { .. }))
    }

    /// Returns true if the caller passed invalid arguments.
    #[must_use]
    pub const fn is_invalid_input(&self) -> bool {
        matches!(self, Self::Deploy(DeployError::InvalidInput { .. }))
    }

    /// Returns true if the payload could not be loaded.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl EcsError {
    /// Creates a transport error for the given operation.
    #[must_use]
    pub fn request(operation: &'static str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            operation,
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
