//! ECS domain types.
//!
//! These types describe services, deployments and task definitions the way
//! the deployment logic sees them. They are independent of the AWS SDK so the
//! orchestration can run against any [`EcsApi`](super::EcsApi) implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status reported by a running task.
pub const TASK_STATUS_RUNNING: &str = "RUNNING";

/// A point-in-time view of an ECS service.
///
/// Snapshots are never mutated after they are fetched; fetch again to get a
/// fresh one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    /// ARN of the cluster the service runs in.
    pub cluster_arn: String,
    /// Service name.
    pub service_name: String,
    /// Service ARN.
    #[serde(default)]
    pub service_arn: Option<String>,
    /// Service status (`ACTIVE`, `DRAINING`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Task definition the service currently points at.
    pub task_definition: String,
    /// Number of tasks the service should run.
    pub desired_count: i32,
    /// Number of tasks in `RUNNING` state.
    #[serde(default)]
    pub running_count: i32,
    /// Number of tasks in `PENDING` state.
    #[serde(default)]
    pub pending_count: i32,
    /// Active deployments.
    #[serde(default)]
    pub deployments: Vec<Deployment>,
    /// Recent service events.
    #[serde(default)]
    pub events: Vec<ServiceEvent>,
}

/// A remote-side deployment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Deployment identifier.
    pub id: String,
    /// Role of this deployment.
    pub status: DeploymentStatus,
    /// Task definition deployed.
    pub task_definition: String,
    /// When the deployment was created.
    pub created_at: DateTime<Utc>,
    /// Desired task count for this deployment.
    #[serde(default)]
    pub desired_count: i32,
    /// Running task count for this deployment.
    #[serde(default)]
    pub running_count: i32,
}

/// Role of a deployment within a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    /// The most recent deployment.
    Primary,
    /// A deployment still draining or being replaced.
    Active,
    /// A finished deployment.
    Inactive,
    /// Anything the control plane reports that we don't know about.
    #[serde(untagged)]
    Other(String),
}

/// A service event message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEvent {
    /// Event identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// When the event was emitted.
    pub created_at: DateTime<Utc>,
    /// Event message.
    pub message: String,
}

/// A task instance as returned by `DescribeTasks`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    /// Task ARN.
    pub task_arn: String,
    /// Task definition the task was started from.
    pub task_definition_arn: String,
    /// Last reported lifecycle status.
    pub last_status: String,
}

/// A registered task definition revision.
///
/// Server-assigned identity lives next to the [`TaskDefinitionTemplate`]
/// rather than inside it, so producing a registrable copy is a plain clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    /// Task definition ARN.
    pub arn: String,
    /// Revision number.
    pub revision: i32,
    /// Registration status (`ACTIVE`, `INACTIVE`).
    #[serde(default)]
    pub status: Option<String>,
    /// When this revision was registered.
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    /// The registrable body of the definition.
    pub template: TaskDefinitionTemplate,
}

/// The patchable, registrable body of a task definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionTemplate {
    /// Task definition family.
    pub family: String,
    /// Task-level CPU units, e.g. `"256"` or `"1 vCPU"`.
    #[serde(default)]
    pub cpu: Option<String>,
    /// Task-level memory, e.g. `"512"` or `"1 GB"`.
    #[serde(default)]
    pub memory: Option<String>,
    /// Containers, in registration order.
    #[serde(default)]
    pub container_definitions: Vec<ContainerDefinition>,
    /// Resource tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Docker networking mode.
    #[serde(default)]
    pub network_mode: Option<String>,
    /// IAM role assumed by the containers.
    #[serde(default)]
    pub task_role_arn: Option<String>,
    /// IAM role used by the agent to pull images and ship logs.
    #[serde(default)]
    pub execution_role_arn: Option<String>,
    /// Launch types the definition was validated against.
    #[serde(default)]
    pub requires_compatibilities: Vec<String>,
    /// Named volumes.
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Placement constraints.
    #[serde(default)]
    pub placement_constraints: Vec<PlacementConstraint>,
}

/// A container inside a task definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    /// Container name, unique within a task definition.
    pub name: String,
    /// Image reference.
    #[serde(default)]
    pub image: Option<String>,
    /// CPU units reserved for the container.
    #[serde(default)]
    pub cpu: Option<i32>,
    /// Hard memory limit in MiB.
    #[serde(default)]
    pub memory: Option<i32>,
    /// Soft memory limit in MiB.
    #[serde(default)]
    pub memory_reservation: Option<i32>,
    /// Whether the task stops when this container stops.
    #[serde(default)]
    pub essential: Option<bool>,
    /// Environment variables, in definition order.
    #[serde(default)]
    pub environment: Vec<KeyValuePair>,
}

/// A name/value environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValuePair {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

/// A resource tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

/// A task definition volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume name referenced by mount points.
    pub name: String,
    /// Host path for bind mounts.
    #[serde(default)]
    pub host_path: Option<String>,
}

/// A task placement constraint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlacementConstraint {
    /// Constraint type (`memberOf`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Cluster query language expression.
    #[serde(default)]
    pub expression: Option<String>,
}

impl ServiceSnapshot {
    /// Returns the PRIMARY deployment, if any.
    #[must_use]
    pub fn primary_deployment(&self) -> Option<&Deployment> {
        self.deployments.iter().find(|d| d.is_primary())
    }

    /// Returns true if exactly one deployment is active.
    #[must_use]
    pub const fn has_single_deployment(&self) -> bool {
        self.deployments.len() == 1
    }
}

impl Deployment {
    /// Returns true if this is the PRIMARY deployment.
    #[must_use]
    pub const fn is_primary(&self) -> bool {
        matches!(self.status, DeploymentStatus::Primary)
    }
}

impl From<&str> for DeploymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "PRIMARY" => Self::Primary,
            "ACTIVE" => Self::Active,
            "INACTIVE" => Self::Inactive,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Primary => "PRIMARY",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Other(other) => other,
        };
        write!(f, "{s}")
    }
}

impl TaskInstance {
    /// Returns true if the task reports `RUNNING`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.last_status == TASK_STATUS_RUNNING
    }
}

impl TaskDefinition {
    /// Produces a registrable copy of this definition.
    ///
    /// Identity (ARN, revision, status, registration time) is left behind.
    #[must_use]
    pub fn to_template(&self) -> TaskDefinitionTemplate {
        self.template.clone()
    }

    /// Returns `family:revision`.
    #[must_use]
    pub fn family_revision(&self) -> String {
        format!("{}:{}", self.template.family, self.revision)
    }
}

impl TaskDefinitionTemplate {
    /// Finds a container by name.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.container_definitions.iter().find(|c| c.name == name)
    }
}

impl ContainerDefinition {
    /// Looks up an environment variable value.
    #[must_use]
    pub fn env(&self, name: &str) -> Option<&str> {
        self.environment
            .iter()
            .find(|pair| pair.name == name)
            .map(|pair| pair.value.as_str())
    }
}

impl KeyValuePair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
