//! ECS integration module.
//!
//! This module provides the control-plane capability the deployer depends
//! on, its AWS implementation, and the health checking and polling built on
//! top of it.

mod aws;
mod client;
mod events;
mod health;
mod poller;
mod types;

pub use aws::AwsEcsClient;
#[cfg(test)]
pub use client::MockEcsApi;
pub use client::EcsApi;
pub use events::{EventCorrelator, EventMatcher, MarkerMatcher, DEFAULT_FAILURE_MARKER};
pub use health::{HealthChecker, HealthStatus};
pub use poller::{SteadyStatePoller, DEFAULT_POLL_INTERVAL};
pub use types::{
    ContainerDefinition, Deployment, DeploymentStatus, KeyValuePair, PlacementConstraint,
    ServiceEvent, ServiceSnapshot, Tag, TaskDefinition, TaskDefinitionTemplate, TaskInstance,
    Volume, TASK_STATUS_RUNNING,
};
