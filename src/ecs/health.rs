//! Steady-state health checking for ECS services.
//!
//! A service is healthy when it has exactly one deployment and the number of
//! running tasks on its current task definition equals its desired count.

use tracing::debug;

use crate::error::Result;

use super::client::EcsApi;
use super::types::ServiceSnapshot;

/// Health status for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    /// Service name.
    pub service_name: String,
    /// Overall verdict.
    pub healthy: bool,
    /// Number of active deployments.
    pub deployments: usize,
    /// Desired task count.
    pub desired_count: i32,
    /// Tasks listed for the service.
    pub listed_tasks: usize,
    /// Tasks running the current task definition.
    pub matching_tasks: usize,
}

/// Health checker for ECS services.
#[derive(Debug)]
pub struct HealthChecker<'a, C: EcsApi + ?Sized> {
    /// Control plane client.
    client: &'a C,
}

impl<'a, C: EcsApi + ?Sized> HealthChecker<'a, C> {
    /// Creates a new health checker.
    #[must_use]
    pub const fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Returns true if the service currently runs its desired configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or describing tasks fails.
    pub async fn looks_good(&self, service: &ServiceSnapshot) -> Result<bool> {
        Ok(self.check(service).await?.healthy)
    }

    /// Checks a service and returns the detailed status.
    ///
    /// # Errors
    ///
    /// Returns an error if listing or describing tasks fails.
    pub async fn check(&self, service: &ServiceSnapshot) -> Result<HealthStatus> {
        let mut status = HealthStatus {
            service_name: service.service_name.clone(),
            healthy: false,
            deployments: service.deployments.len(),
            desired_count: service.desired_count,
            listed_tasks: 0,
            matching_tasks: 0,
        };

        // Mid-rollout, or nothing deployed at all
        if !service.has_single_deployment() {
            debug!(
                "Service {} has {} deployments",
                service.service_name,
                service.deployments.len()
            );
            return Ok(status);
        }

        let task_arns = self.client.list_service_tasks(service).await?;
        status.listed_tasks = task_arns.len();

        if task_arns.is_empty() {
            status.healthy = service.desired_count == 0;
            return Ok(status);
        }

        let tasks = self.client.describe_tasks(service, &task_arns).await?;
        status.matching_tasks = tasks
            .iter()
            .filter(|t| t.task_definition_arn == service.task_definition && t.is_running())
            .count();

        status.healthy = i64::try_from(status.matching_tasks).is_ok_and(|matching| {
            matching == i64::from(service.desired_count)
        });

        debug!(
            "Service {}: {}/{} tasks on current definition",
            service.service_name, status.matching_tasks, service.desired_count
        );

        Ok(status)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verdict = if self.healthy { "healthy" } else { "unhealthy" };
        write!(f, "{}: {verdict}", self.service_name)?;

        if self.deployments == 1 {
            write!(
                f,
                " ({}/{} tasks on current definition)",
                self.matching_tasks, self.desired_count
            )
        } else {
            write!(f, " ({} deployments in progress)", self.deployments)
        }
    }
}
