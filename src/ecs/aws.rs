//! ECS control plane client backed by the AWS SDK.

use async_trait::async_trait;
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::primitives::DateTime as AwsDateTime;
use aws_sdk_ecs::types as sdk;
use aws_sdk_ecs::Client;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{EcsError, Result};

use super::client::EcsApi;
use super::types::{
    ContainerDefinition, Deployment, DeploymentStatus, KeyValuePair, PlacementConstraint,
    ServiceEvent, ServiceSnapshot, Tag, TaskDefinition, TaskDefinitionTemplate, TaskInstance,
    Volume,
};

/// Maximum number of tasks `DescribeTasks` accepts per call.
const DESCRIBE_TASKS_BATCH: usize = 100;

/// [`EcsApi`] implementation talking to AWS.
#[derive(Debug, Clone)]
pub struct AwsEcsClient {
    /// ECS client.
    client: Client,
}

impl AwsEcsClient {
    /// Creates a client from the environment's AWS configuration.
    ///
    /// `region` overrides the region found in the environment.
    pub async fn new(region: Option<&str>) -> Self {
        let config = if let Some(region_str) = region {
            aws_config::from_env()
                .region(aws_config::Region::new(region_str.to_string()))
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Self {
            client: Client::new(&config),
        }
    }

    /// Creates a client from an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Describes a task definition, returning the SDK types untouched.
    async fn fetch_task_definition(
        &self,
        reference: &str,
    ) -> Result<(sdk::TaskDefinition, Vec<sdk::Tag>)> {
        let output = self
            .client
            .describe_task_definition()
            .task_definition(reference)
            .include(sdk::TaskDefinitionField::Tags)
            .send()
            .await
            .map_err(|e| request_error("describe task definition", &e))?;

        let definition =
            output
                .task_definition
                .ok_or_else(|| EcsError::TaskDefinitionNotFound {
                    reference: reference.to_string(),
                })?;

        Ok((definition, output.tags.unwrap_or_default()))
    }
}

#[async_trait]
impl EcsApi for AwsEcsClient {
    async fn describe_service(&self, cluster: &str, service: &str) -> Result<ServiceSnapshot> {
        debug!("Describing service {service} in cluster {cluster}");

        let output = self
            .client
            .describe_services()
            .cluster(cluster)
            .services(service)
            .send()
            .await
            .map_err(|e| request_error("describe services", &e))?;

        let found = single_service(output.services.unwrap_or_default(), cluster, service)?;
        Ok(service_from_sdk(found))
    }

    async fn list_service_tasks(&self, service: &ServiceSnapshot) -> Result<Vec<String>> {
        let mut arns = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_tasks()
                .cluster(&service.cluster_arn)
                .service_name(&service.service_name)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| request_error("list tasks", &e))?;

            arns.extend(output.task_arns.unwrap_or_default());

            match output.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        debug!("Service {} has {} tasks", service.service_name, arns.len());
        Ok(arns)
    }

    async fn describe_tasks(
        &self,
        service: &ServiceSnapshot,
        task_arns: &[String],
    ) -> Result<Vec<TaskInstance>> {
        let mut tasks = Vec::with_capacity(task_arns.len());

        for batch in task_arns.chunks(DESCRIBE_TASKS_BATCH) {
            let output = self
                .client
                .describe_tasks()
                .cluster(&service.cluster_arn)
                .set_tasks(Some(batch.to_vec()))
                .send()
                .await
                .map_err(|e| request_error("describe tasks", &e))?;

            tasks.extend(
                output
                    .tasks
                    .unwrap_or_default()
                    .into_iter()
                    .map(|task| TaskInstance {
                        task_arn: task.task_arn.unwrap_or_default(),
                        task_definition_arn: task.task_definition_arn.unwrap_or_default(),
                        last_status: task.last_status.unwrap_or_default(),
                    }),
            );
        }

        Ok(tasks)
    }

    async fn describe_task_definition(&self, reference: &str) -> Result<TaskDefinition> {
        debug!("Describing task definition {reference}");
        let (definition, tags) = self.fetch_task_definition(reference).await?;
        Ok(task_definition_from_sdk(definition, tags))
    }

    async fn register_task_definition(
        &self,
        template: &TaskDefinitionTemplate,
        base: &TaskDefinition,
    ) -> Result<TaskDefinition> {
        // Start from the full base revision so fields we don't model survive
        let (mut definition, _) = self.fetch_task_definition(&base.arn).await?;
        overlay_template(&mut definition, template);

        let output = self
            .client
            .register_task_definition()
            .family(&template.family)
            .set_task_role_arn(definition.task_role_arn)
            .set_execution_role_arn(definition.execution_role_arn)
            .set_network_mode(definition.network_mode)
            .set_container_definitions(definition.container_definitions)
            .set_volumes(definition.volumes)
            .set_placement_constraints(definition.placement_constraints)
            .set_requires_compatibilities(definition.requires_compatibilities)
            .set_cpu(definition.cpu)
            .set_memory(definition.memory)
            .set_pid_mode(definition.pid_mode)
            .set_ipc_mode(definition.ipc_mode)
            .set_proxy_configuration(definition.proxy_configuration)
            .set_inference_accelerators(definition.inference_accelerators)
            .set_ephemeral_storage(definition.ephemeral_storage)
            .set_runtime_platform(definition.runtime_platform)
            .set_tags(registration_tags(&template.tags))
            .send()
            .await
            .map_err(|e| request_error("register task definition", &e))?;

        let registered = output.task_definition.ok_or_else(|| {
            EcsError::invalid_response("register task definition returned no task definition")
        })?;
        let registered = task_definition_from_sdk(registered, output.tags.unwrap_or_default());

        info!("Registered task definition {}", registered.family_revision());
        Ok(registered)
    }

    async fn update_service(
        &self,
        service: &ServiceSnapshot,
        task_definition_arn: &str,
    ) -> Result<ServiceSnapshot> {
        debug!(
            "Pointing service {} at {task_definition_arn}",
            service.service_name
        );

        let output = self
            .client
            .update_service()
            .cluster(&service.cluster_arn)
            .service(&service.service_name)
            .task_definition(task_definition_arn)
            .send()
            .await
            .map_err(|e| request_error("update service", &e))?;

        let updated = output
            .service
            .ok_or_else(|| EcsError::invalid_response("update service returned no service"))?;

        Ok(service_from_sdk(updated))
    }
}

fn request_error(operation: &'static str, error: &impl std::error::Error) -> EcsError {
    EcsError::request(operation, DisplayErrorContext(error).to_string())
}

/// Picks the one service a lookup by name must return.
fn single_service(
    mut services: Vec<sdk::Service>,
    cluster: &str,
    service: &str,
) -> Result<sdk::Service> {
    match services.len() {
        0 => Err(EcsError::ServiceNotFound {
            cluster: cluster.to_string(),
            service: service.to_string(),
        }
        .into()),
        1 => Ok(services.remove(0)),
        count => Err(EcsError::AmbiguousService {
            cluster: cluster.to_string(),
            service: service.to_string(),
            count,
        }
        .into()),
    }
}

/// Tags for a registration, absent when there are none.
fn registration_tags(tags: &[Tag]) -> Option<Vec<sdk::Tag>> {
    if tags.is_empty() {
        return None;
    }
    Some(
        tags.iter()
            .map(|t| sdk::Tag::builder().key(&t.key).value(&t.value).build())
            .collect(),
    )
}

/// Writes the patchable fields of `template` onto an SDK definition.
fn overlay_template(definition: &mut sdk::TaskDefinition, template: &TaskDefinitionTemplate) {
    definition.family = Some(template.family.clone());
    definition.cpu.clone_from(&template.cpu);
    definition.memory.clone_from(&template.memory);

    for container in definition.container_definitions.iter_mut().flatten() {
        let Some(patched) = container
            .name
            .as_deref()
            .and_then(|name| template.container(name))
        else {
            continue;
        };

        container.image.clone_from(&patched.image);
        container.cpu = patched.cpu.unwrap_or_default();
        container.memory = patched.memory;
        container.memory_reservation = patched.memory_reservation;

        let environment: Vec<sdk::KeyValuePair> = patched
            .environment
            .iter()
            .map(|pair| {
                sdk::KeyValuePair::builder()
                    .name(&pair.name)
                    .value(&pair.value)
                    .build()
            })
            .collect();
        if !environment.is_empty() || container.environment.is_some() {
            container.environment = Some(environment);
        }
    }
}

fn to_utc(value: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn service_from_sdk(service: sdk::Service) -> ServiceSnapshot {
    let deployments = service
        .deployments
        .unwrap_or_default()
        .into_iter()
        .map(|d| Deployment {
            id: d.id.unwrap_or_default(),
            status: DeploymentStatus::from(d.status.as_deref().unwrap_or_default()),
            task_definition: d.task_definition.unwrap_or_default(),
            created_at: d.created_at.as_ref().and_then(to_utc).unwrap_or_default(),
            desired_count: d.desired_count,
            running_count: d.running_count,
        })
        .collect();

    let events = service
        .events
        .unwrap_or_default()
        .into_iter()
        .map(|e| ServiceEvent {
            id: e.id,
            created_at: e.created_at.as_ref().and_then(to_utc).unwrap_or_default(),
            message: e.message.unwrap_or_default(),
        })
        .collect();

    ServiceSnapshot {
        cluster_arn: service.cluster_arn.unwrap_or_default(),
        service_name: service.service_name.unwrap_or_default(),
        service_arn: service.service_arn,
        status: service.status,
        task_definition: service.task_definition.unwrap_or_default(),
        desired_count: service.desired_count,
        running_count: service.running_count,
        pending_count: service.pending_count,
        deployments,
        events,
    }
}

fn task_definition_from_sdk(
    definition: sdk::TaskDefinition,
    tags: Vec<sdk::Tag>,
) -> TaskDefinition {
    let container_definitions = definition
        .container_definitions
        .unwrap_or_default()
        .into_iter()
        .map(|c| ContainerDefinition {
            name: c.name.unwrap_or_default(),
            image: c.image,
            cpu: (c.cpu != 0).then_some(c.cpu),
            memory: c.memory,
            memory_reservation: c.memory_reservation,
            essential: c.essential,
            environment: c
                .environment
                .unwrap_or_default()
                .into_iter()
                .map(|kv| {
                    KeyValuePair::new(kv.name.unwrap_or_default(), kv.value.unwrap_or_default())
                })
                .collect(),
        })
        .collect();

    let template = TaskDefinitionTemplate {
        family: definition.family.unwrap_or_default(),
        cpu: definition.cpu,
        memory: definition.memory,
        container_definitions,
        tags: tags
            .into_iter()
            .map(|t| Tag {
                key: t.key.unwrap_or_default(),
                value: t.value.unwrap_or_default(),
            })
            .collect(),
        network_mode: definition.network_mode.map(|m| m.as_str().to_string()),
        task_role_arn: definition.task_role_arn,
        execution_role_arn: definition.execution_role_arn,
        requires_compatibilities: definition
            .requires_compatibilities
            .unwrap_or_default()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        volumes: definition
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| Volume {
                name: v.name.unwrap_or_default(),
                host_path: v.host.and_then(|h| h.source_path),
            })
            .collect(),
        placement_constraints: definition
            .placement_constraints
            .unwrap_or_default()
            .into_iter()
            .map(|p| PlacementConstraint {
                kind: p.r#type.map(|t| t.as_str().to_string()).unwrap_or_default(),
                expression: p.expression,
            })
            .collect(),
    };

    TaskDefinition {
        arn: definition.task_definition_arn.unwrap_or_default(),
        revision: definition.revision,
        status: definition.status.map(|s| s.as_str().to_string()),
        registered_at: definition.registered_at.as_ref().and_then(to_utc),
        template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShipError;
    use crate::testing;
    use aws_sdk_ecs::config::{BehaviorVersion, Credentials, Region};
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TARGET: &str = "x-amz-target";

    fn target(operation: &str) -> String {
        format!("AmazonEC2ContainerServiceV20141113.{operation}")
    }

    fn reply(body: &Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/x-amz-json-1.1")
    }

    fn client_for(server: &MockServer) -> AwsEcsClient {
        let config = aws_sdk_ecs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "tests"))
            .endpoint_url(server.uri())
            .build();
        AwsEcsClient::with_client(Client::from_conf(config))
    }

    async fn request_bodies(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| request.body_json::<Value>().unwrap())
            .collect()
    }

    fn sdk_definition() -> sdk::TaskDefinition {
        sdk::TaskDefinition::builder()
            .task_definition_arn(testing::OLD_TASK_DEF)
            .family("web")
            .revision(7)
            .cpu("256")
            .memory("512")
            .network_mode(sdk::NetworkMode::Awsvpc)
            .requires_compatibilities(sdk::Compatibility::Fargate)
            .container_definitions(
                sdk::ContainerDefinition::builder()
                    .name("app")
                    .image("registry.example.com/app:1.0")
                    .cpu(0)
                    .memory(256)
                    .environment(sdk::KeyValuePair::builder().name("K").value("old").build())
                    .port_mappings(sdk::PortMapping::builder().container_port(8080).build())
                    .build(),
            )
            .build()
    }

    #[test]
    fn test_task_definition_conversion() {
        let tags = vec![sdk::Tag::builder().key("team").value("core").build()];
        let definition = task_definition_from_sdk(sdk_definition(), tags);

        assert_eq!(definition.arn, testing::OLD_TASK_DEF);
        assert_eq!(definition.revision, 7);
        assert_eq!(definition.family_revision(), "web:7");

        let template = definition.template;
        assert_eq!(template.network_mode.as_deref(), Some("awsvpc"));
        assert_eq!(template.requires_compatibilities, vec!["FARGATE"]);
        assert_eq!(template.tags.len(), 1);

        let app = template.container("app").unwrap();
        assert_eq!(app.cpu, None);
        assert_eq!(app.memory, Some(256));
        assert_eq!(app.env("K"), Some("old"));
    }

    #[test]
    fn test_overlay_keeps_unmodelled_fields() {
        let mut definition = sdk_definition();
        let mut template = task_definition_from_sdk(definition.clone(), vec![]).template;
        template.memory = Some(String::from("1024"));
        template.container_definitions[0].image = Some(String::from("app:2"));
        template.container_definitions[0].cpu = Some(128);
        template.container_definitions[0]
            .environment
            .push(KeyValuePair::new("L", "x"));

        overlay_template(&mut definition, &template);

        assert_eq!(definition.memory.as_deref(), Some("1024"));
        let containers = definition.container_definitions.unwrap();
        let app = &containers[0];
        assert_eq!(app.image.as_deref(), Some("app:2"));
        assert_eq!(app.cpu, 128);
        assert_eq!(app.environment.as_ref().map(Vec::len), Some(2));
        assert_eq!(app.port_mappings.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_service_conversion() {
        let created = AwsDateTime::from_secs(testing::t0().timestamp());
        let service = sdk::Service::builder()
            .cluster_arn(testing::CLUSTER_ARN)
            .service_name("web")
            .task_definition(testing::NEW_TASK_DEF)
            .desired_count(2)
            .deployments(
                sdk::Deployment::builder()
                    .id("ecs-svc/1")
                    .status("PRIMARY")
                    .task_definition(testing::NEW_TASK_DEF)
                    .created_at(created)
                    .build(),
            )
            .events(
                sdk::ServiceEvent::builder()
                    .created_at(created)
                    .message("(service web) has reached a steady state.")
                    .build(),
            )
            .build();

        let snapshot = service_from_sdk(service);

        assert_eq!(snapshot.desired_count, 2);
        assert!(snapshot.has_single_deployment());
        assert_eq!(
            snapshot.primary_deployment().map(|d| d.created_at),
            Some(testing::t0())
        );
        assert_eq!(snapshot.events[0].created_at, testing::t0());
    }

    #[test]
    fn test_single_service_requires_exactly_one_match() {
        let web = || sdk::Service::builder().service_name("web").build();

        let err = single_service(vec![], "main", "web").unwrap_err();
        assert!(matches!(err, ShipError::Ecs(EcsError::ServiceNotFound { .. })));

        let err = single_service(vec![web(), web()], "main", "web").unwrap_err();
        assert!(matches!(
            err,
            ShipError::Ecs(EcsError::AmbiguousService { count: 2, .. })
        ));

        let found = single_service(vec![web()], "main", "web").unwrap();
        assert_eq!(found.service_name.as_deref(), Some("web"));
    }

    #[test]
    fn test_registration_tags_absent_when_empty() {
        assert!(registration_tags(&[]).is_none());

        let tags = registration_tags(&[Tag {
            key: String::from("team"),
            value: String::from("core"),
        }])
        .unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].key.as_deref(), Some("team"));
    }

    #[tokio::test]
    async fn test_describe_service_with_no_match_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("DescribeServices").as_str()))
            .respond_with(reply(&json!({
                "services": [],
                "failures": [{ "arn": "web", "reason": "MISSING" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .describe_service("main", "web")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "ECS error: service web not found in cluster main");
    }

    #[tokio::test]
    async fn test_list_tasks_follows_next_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("ListTasks").as_str()))
            .and(body_partial_json(json!({ "nextToken": "page-2" })))
            .respond_with(reply(&json!({ "taskArns": ["task/3"] })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("ListTasks").as_str()))
            .respond_with(reply(&json!({
                "taskArns": ["task/1", "task/2"],
                "nextToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let arns = client_for(&server)
            .list_service_tasks(&testing::service(testing::NEW_TASK_DEF, 3))
            .await
            .unwrap();

        assert_eq!(arns, vec!["task/1", "task/2", "task/3"]);
        let bodies = request_bodies(&server).await;
        assert_eq!(bodies[0]["serviceName"], "web");
        assert!(bodies[0].get("nextToken").is_none());
        assert_eq!(bodies[1]["nextToken"], "page-2");
    }

    #[tokio::test]
    async fn test_describe_tasks_is_batched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("DescribeTasks").as_str()))
            .respond_with(reply(&json!({
                "tasks": [{
                    "taskArn": "task/1",
                    "taskDefinitionArn": testing::NEW_TASK_DEF,
                    "lastStatus": "RUNNING"
                }],
                "failures": []
            })))
            .expect(2)
            .mount(&server)
            .await;

        let arns: Vec<String> = (0..150).map(|i| format!("task/{i}")).collect();
        let tasks = client_for(&server)
            .describe_tasks(&testing::service(testing::NEW_TASK_DEF, 150), &arns)
            .await
            .unwrap();

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.last_status == "RUNNING"));
        let batch_sizes: Vec<usize> = request_bodies(&server)
            .await
            .iter()
            .map(|body| body["tasks"].as_array().map_or(0, Vec::len))
            .collect();
        assert_eq!(batch_sizes, vec![100, 50]);
    }

    #[tokio::test]
    async fn test_register_omits_empty_tags_and_keeps_base_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("DescribeTaskDefinition").as_str()))
            .respond_with(reply(&json!({
                "taskDefinition": {
                    "taskDefinitionArn": testing::OLD_TASK_DEF,
                    "family": "web",
                    "revision": 7,
                    "cpu": "256",
                    "memory": "512",
                    "containerDefinitions": [{
                        "name": "app",
                        "image": "registry.example.com/app:1.0",
                        "cpu": 0,
                        "memory": 256,
                        "portMappings": [{ "containerPort": 8080 }]
                    }]
                },
                "tags": []
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(header(TARGET, target("RegisterTaskDefinition").as_str()))
            .respond_with(reply(&json!({
                "taskDefinition": {
                    "taskDefinitionArn": testing::NEW_TASK_DEF,
                    "family": "web",
                    "revision": 8,
                    "containerDefinitions": [{
                        "name": "app",
                        "image": "registry.example.com/app:2.0"
                    }]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let base = task_definition_from_sdk(sdk_definition(), vec![]);
        let mut template = base.template.clone();
        template.container_definitions[0].image =
            Some(String::from("registry.example.com/app:2.0"));

        let registered = client_for(&server)
            .register_task_definition(&template, &base)
            .await
            .unwrap();

        assert_eq!(registered.arn, testing::NEW_TASK_DEF);
        assert_eq!(registered.family_revision(), "web:8");

        let bodies = request_bodies(&server).await;
        let registration = &bodies[1];
        assert!(registration.get("tags").is_none());
        let app = &registration["containerDefinitions"][0];
        assert_eq!(app["image"], "registry.example.com/app:2.0");
        assert_eq!(app["portMappings"][0]["containerPort"], 8080);
    }
}
