//! Builders shared by unit tests.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};

use crate::ecs::{
    ContainerDefinition, Deployment, DeploymentStatus, KeyValuePair, ServiceEvent,
    ServiceSnapshot, TaskDefinition, TaskDefinitionTemplate, TaskInstance,
};

pub const CLUSTER_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:cluster/main";
pub const OLD_TASK_DEF: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition/web:7";
pub const NEW_TASK_DEF: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition/web:8";

/// Fixed instant all fixture timestamps are relative to.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn at(seconds: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::seconds(seconds)
}

pub fn deployment(
    status: DeploymentStatus,
    task_definition: &str,
    created_at: DateTime<Utc>,
) -> Deployment {
    Deployment {
        id: format!("ecs-svc/{}", created_at.timestamp()),
        status,
        task_definition: task_definition.to_string(),
        created_at,
        desired_count: 2,
        running_count: 0,
    }
}

pub fn event(created_at: DateTime<Utc>, message: &str) -> ServiceEvent {
    ServiceEvent {
        id: None,
        created_at,
        message: message.to_string(),
    }
}

/// A steady service on `task_definition` with a single PRIMARY deployment.
pub fn service(task_definition: &str, desired_count: i32) -> ServiceSnapshot {
    ServiceSnapshot {
        cluster_arn: CLUSTER_ARN.to_string(),
        service_name: String::from("web"),
        service_arn: None,
        status: Some(String::from("ACTIVE")),
        task_definition: task_definition.to_string(),
        desired_count,
        running_count: desired_count,
        pending_count: 0,
        deployments: vec![deployment(DeploymentStatus::Primary, task_definition, t0())],
        events: vec![],
    }
}

pub fn task(index: usize, task_definition: &str, last_status: &str) -> TaskInstance {
    TaskInstance {
        task_arn: format!("arn:aws:ecs:us-east-1:123456789012:task/main/{index}"),
        task_definition_arn: task_definition.to_string(),
        last_status: last_status.to_string(),
    }
}

pub fn container(name: &str, image: &str) -> ContainerDefinition {
    ContainerDefinition {
        name: name.to_string(),
        image: Some(image.to_string()),
        cpu: Some(128),
        memory: Some(256),
        memory_reservation: None,
        essential: Some(true),
        environment: vec![KeyValuePair::new("K", "old")],
    }
}

pub fn template() -> TaskDefinitionTemplate {
    TaskDefinitionTemplate {
        family: String::from("web"),
        cpu: Some(String::from("256")),
        memory: Some(String::from("512")),
        container_definitions: vec![
            container("app", "registry.example.com/app:1.0"),
            container("sidecar", "registry.example.com/proxy:2.3"),
        ],
        network_mode: Some(String::from("awsvpc")),
        requires_compatibilities: vec![String::from("FARGATE")],
        ..TaskDefinitionTemplate::default()
    }
}

pub fn task_definition(
    arn: &str,
    revision: i32,
    template: TaskDefinitionTemplate,
) -> TaskDefinition {
    TaskDefinition {
        arn: arn.to_string(),
        revision,
        status: Some(String::from("ACTIVE")),
        registered_at: Some(t0()),
        template,
    }
}
