//! The control-plane capability the deployment logic depends on.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::error::Result;

use super::types::{ServiceSnapshot, TaskDefinition, TaskDefinitionTemplate, TaskInstance};

/// Operations against the ECS control plane.
///
/// Implementations are treated as stateless. Nothing here requires them to
/// be safe for concurrent use against the same service.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EcsApi: Send + Sync {
    /// Fetches the single service matching `service` in `cluster`.
    ///
    /// Fails with `ServiceNotFound` or `AmbiguousService` when the lookup does
    /// not resolve to exactly one service.
    async fn describe_service(&self, cluster: &str, service: &str) -> Result<ServiceSnapshot>;

    /// Lists the ARNs of the tasks currently running for a service.
    async fn list_service_tasks(&self, service: &ServiceSnapshot) -> Result<Vec<String>>;

    /// Describes the given tasks of a service.
    async fn describe_tasks(
        &self,
        service: &ServiceSnapshot,
        task_arns: &[String],
    ) -> Result<Vec<TaskInstance>>;

    /// Describes a task definition by ARN or `family:revision`, tags included.
    async fn describe_task_definition(&self, reference: &str) -> Result<TaskDefinition>;

    /// Registers `template` as a new revision.
    ///
    /// `base` is the revision the template was derived from; implementations
    /// use it to carry through any field the template does not model.
    async fn register_task_definition(
        &self,
        template: &TaskDefinitionTemplate,
        base: &TaskDefinition,
    ) -> Result<TaskDefinition>;

    /// Points the service at another task definition revision.
    async fn update_service(
        &self,
        service: &ServiceSnapshot,
        task_definition_arn: &str,
    ) -> Result<ServiceSnapshot>;
}
