//! Applying patches to task definition templates.

use std::collections::BTreeSet;
use tracing::debug;

use crate::config::{ContainerPatch, TaskPatch};
use crate::ecs::{ContainerDefinition, KeyValuePair, TaskDefinitionTemplate};

use super::diff::{ContainerDiff, TaskDiff};

/// Applies `patch` to `template`.
///
/// Returns the patched copy and the diff describing what the patch set.
/// The input template is never modified. Containers the patch names but the
/// template lacks are ignored.
#[must_use]
pub fn apply(
    patch: &TaskPatch,
    template: &TaskDefinitionTemplate,
) -> (TaskDefinitionTemplate, TaskDiff) {
    let mut patched = template.clone();
    let mut diff = TaskDiff::default();

    if let Some(cpu) = &patch.cpu {
        diff.record_cpu(patched.cpu.replace(cpu.clone()), Some(cpu.clone()));
    }
    if let Some(memory) = &patch.memory {
        diff.record_memory(patched.memory.replace(memory.clone()), Some(memory.clone()));
    }

    for container in &mut patched.container_definitions {
        if let Some(container_patch) = patch.container_definitions.get(&container.name) {
            let container_diff = apply_container(container_patch, container);
            diff.record_container(container.name.clone(), container_diff);
        }
    }

    for name in patch.container_definitions.keys() {
        if template.container(name).is_none() {
            debug!("Ignoring patch for unknown container {name}");
        }
    }

    (patched, diff)
}

/// Applies a container patch in place and returns its diff.
fn apply_container(patch: &ContainerPatch, container: &mut ContainerDefinition) -> ContainerDiff {
    let mut diff = ContainerDiff::default();

    if let Some(cpu) = patch.cpu {
        diff.record_cpu(container.cpu.replace(cpu), Some(cpu));
    }
    if let Some(image) = &patch.image {
        diff.record_image(container.image.replace(image.clone()), Some(image.clone()));
    }
    if let Some(memory) = patch.memory {
        diff.record_memory(container.memory.replace(memory), Some(memory));
    }
    if let Some(reservation) = patch.memory_reservation {
        diff.record_memory_reservation(
            container.memory_reservation.replace(reservation),
            Some(reservation),
        );
    }

    // Existing variables are updated in place, keeping their position
    let mut consumed = BTreeSet::new();
    for pair in &mut container.environment {
        if let Some(value) = patch.environment.get(&pair.name) {
            let was = std::mem::replace(&mut pair.value, value.clone());
            diff.record_environment(pair.name.clone(), Some(was), Some(value.clone()));
            consumed.insert(pair.name.clone());
        }
    }

    // New variables go at the end, in name order
    for (name, value) in &patch.environment {
        if consumed.contains(name) {
            continue;
        }
        container.environment.push(KeyValuePair::new(name.clone(), value.clone()));
        diff.record_environment(name.clone(), None, Some(value.clone()));
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn env_of(template: &TaskDefinitionTemplate, container: &str) -> Vec<(String, String)> {
        template
            .container(container)
            .map(|c| {
                c.environment
                    .iter()
                    .map(|p| (p.name.clone(), p.value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn test_empty_patch_is_empty_diff() {
        let template = testing::template();
        let (patched, diff) = apply(&TaskPatch::default(), &template);

        assert!(diff.is_empty());
        assert_eq!(patched, template);
    }

    #[test]
    fn test_apply_does_not_touch_input() {
        let template = testing::template();
        let before = template.clone();
        let patch = TaskPatch::default().with_memory("2048").with_container(
            "app",
            ContainerPatch::default().with_image("app:9").with_env("NEW", "1"),
        );

        let (patched, diff) = apply(&patch, &template);

        assert_eq!(template, before);
        assert_ne!(patched, template);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_equal_value_is_recorded_but_empty() {
        let template = testing::template();
        let patch = TaskPatch::default().with_cpu("256");

        let (patched, diff) = apply(&patch, &template);

        assert!(diff.cpu().is_some());
        assert!(diff.is_empty());
        assert_eq!(patched, template);
    }

    #[test]
    fn test_task_memory_recorded_under_memory() {
        let template = testing::template();
        let (patched, diff) = apply(&TaskPatch::default().with_memory("1024"), &template);

        assert!(diff.cpu().is_none());
        let memory = diff.memory().unwrap();
        assert_eq!(memory.was().map(String::as_str), Some("512"));
        assert_eq!(memory.is_now().map(String::as_str), Some("1024"));
        assert_eq!(patched.memory.as_deref(), Some("1024"));
    }

    #[test]
    fn test_reapplying_converged_patch_is_noop() {
        let template = testing::template();
        let patch = TaskPatch::default().with_cpu("1024").with_container(
            "sidecar",
            ContainerPatch {
                cpu: Some(64),
                memory: Some(128),
                memory_reservation: Some(64),
                image: Some(String::from("proxy:3")),
                environment: [(String::from("A"), String::from("1"))].into_iter().collect(),
            },
        );

        let (once, first) = apply(&patch, &template);
        let (twice, second) = apply(&patch, &once);

        assert!(!first.is_empty());
        assert!(second.is_empty());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_environment_merge() {
        let template = testing::template();
        let patch = TaskPatch::default().with_container(
            "app",
            ContainerPatch::default().with_env("K", "new").with_env("L", "x"),
        );

        let (patched, diff) = apply(&patch, &template);

        assert_eq!(
            env_of(&patched, "app"),
            vec![
                (String::from("K"), String::from("new")),
                (String::from("L"), String::from("x")),
            ]
        );

        let app = diff.container("app").unwrap();
        let k = app.environment("K").unwrap();
        assert_eq!(k.was().map(String::as_str), Some("old"));
        assert_eq!(k.is_now().map(String::as_str), Some("new"));
        let l = app.environment("L").unwrap();
        assert_eq!(l.was(), None);
        assert_eq!(l.is_now().map(String::as_str), Some("x"));
    }

    #[test]
    fn test_existing_variables_keep_position() {
        let mut template = testing::template();
        template.container_definitions[0].environment = vec![
            KeyValuePair::new("A", "1"),
            KeyValuePair::new("B", "2"),
            KeyValuePair::new("C", "3"),
        ];
        let patch = TaskPatch::default().with_container(
            "app",
            ContainerPatch::default()
                .with_env("C", "30")
                .with_env("Z", "26")
                .with_env("A", "10")
                .with_env("M", "13"),
        );

        let (patched, _) = apply(&patch, &template);
        let names: Vec<String> = env_of(&patched, "app").into_iter().map(|(n, _)| n).collect();

        assert_eq!(names, vec!["A", "B", "C", "M", "Z"]);
        assert_eq!(patched.container_definitions[0].env("A"), Some("10"));
        assert_eq!(patched.container_definitions[0].env("B"), Some("2"));
    }

    #[test]
    fn test_unknown_container_is_ignored() {
        let template = testing::template();
        let patch = TaskPatch::default()
            .with_container("ghost", ContainerPatch::default().with_image("ghost:1"));

        let (patched, diff) = apply(&patch, &template);

        assert!(diff.is_empty());
        assert!(diff.container("ghost").is_none());
        assert_eq!(patched, template);
    }

    #[test]
    fn test_untouched_container_has_no_diff_entry() {
        let template = testing::template();
        let patch = TaskPatch::default()
            .with_container("app", ContainerPatch::default().with_image("app:2"));

        let (patched, diff) = apply(&patch, &template);

        assert!(diff.container("sidecar").is_none());
        assert_eq!(patched.container_definitions[1], template.container_definitions[1]);
        assert_eq!(
            patched.container_definitions[0].image.as_deref(),
            Some("app:2")
        );
    }

    #[test]
    fn test_passthrough_fields_survive() {
        let mut template = testing::template();
        template.task_role_arn = Some(String::from("arn:aws:iam::1:role/web"));
        template.tags = vec![crate::ecs::Tag {
            key: String::from("team"),
            value: String::from("core"),
        }];

        let (patched, _) = apply(&TaskPatch::default().with_cpu("2048"), &template);

        assert_eq!(patched.task_role_arn, template.task_role_arn);
        assert_eq!(patched.tags, template.tags);
        assert_eq!(patched.network_mode.as_deref(), Some("awsvpc"));
        assert_eq!(patched.family, "web");
    }
}
