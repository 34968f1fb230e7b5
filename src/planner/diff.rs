//! Diff tree recording what a patch changed.
//!
//! The tree mirrors the patch: a [`TaskDiff`] holds task-level
//! [`ScalarDiff`]s plus one [`ContainerDiff`] per patched container. A field
//! is only present in the tree if the patch set it; whether it actually
//! changed is decided by value equality when asking [`TaskDiff::is_empty`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

/// A value that can appear in a [`ScalarDiff`].
pub trait DiffValue: Clone + PartialEq {
    /// Renders the value for change reports.
    fn render(&self) -> String;
}

impl DiffValue for String {
    fn render(&self) -> String {
        format!("\"{self}\"")
    }
}

impl DiffValue for i32 {
    fn render(&self) -> String {
        self.to_string()
    }
}

/// Transition of a single optional field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarDiff<T> {
    was: Option<T>,
    is_now: Option<T>,
}

impl<T: DiffValue> ScalarDiff<T> {
    /// Creates a diff from the old and new values.
    #[must_use]
    pub const fn new(was: Option<T>, is_now: Option<T>) -> Self {
        Self { was, is_now }
    }

    /// Overwrites the recorded transition.
    pub fn change(&mut self, was: Option<T>, is_now: Option<T>) {
        self.was = was;
        self.is_now = is_now;
    }

    /// Returns true if the value did not change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.was == self.is_now
    }

    /// The value before the patch.
    #[must_use]
    pub const fn was(&self) -> Option<&T> {
        self.was.as_ref()
    }

    /// The value after the patch.
    #[must_use]
    pub const fn is_now(&self) -> Option<&T> {
        self.is_now.as_ref()
    }
}

fn render_optional<T: DiffValue>(value: Option<&T>) -> String {
    value.map_or_else(|| String::from("<nil>"), DiffValue::render)
}

impl<T: DiffValue> fmt::Display for ScalarDiff<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(
            f,
            "was: {} and now is: {}",
            render_optional(self.was()),
            render_optional(self.is_now())
        )
    }
}

fn scalar_is_empty<T: DiffValue>(diff: Option<&ScalarDiff<T>>) -> bool {
    diff.is_none_or(ScalarDiff::is_empty)
}

fn record<T: DiffValue>(slot: &mut Option<ScalarDiff<T>>, was: Option<T>, is_now: Option<T>) {
    match slot {
        Some(diff) => diff.change(was, is_now),
        None => *slot = Some(ScalarDiff::new(was, is_now)),
    }
}

fn push_scalar<T: DiffValue>(parts: &mut Vec<String>, label: &str, diff: Option<&ScalarDiff<T>>) {
    if let Some(diff) = diff.filter(|d| !d.is_empty()) {
        parts.push(format!("{label} {diff}"));
    }
}

/// Changes applied to one container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<ScalarDiff<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ScalarDiff<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<ScalarDiff<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_reservation: Option<ScalarDiff<i32>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, ScalarDiff<String>>,
}

impl ContainerDiff {
    /// Returns true if nothing in this container changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        scalar_is_empty(self.cpu.as_ref())
            && scalar_is_empty(self.image.as_ref())
            && scalar_is_empty(self.memory.as_ref())
            && scalar_is_empty(self.memory_reservation.as_ref())
            && self.environment.values().all(ScalarDiff::is_empty)
    }

    /// Records a CPU change.
    pub fn record_cpu(&mut self, was: Option<i32>, is_now: Option<i32>) {
        record(&mut self.cpu, was, is_now);
    }

    /// Records an image change.
    pub fn record_image(&mut self, was: Option<String>, is_now: Option<String>) {
        record(&mut self.image, was, is_now);
    }

    /// Records a memory change.
    pub fn record_memory(&mut self, was: Option<i32>, is_now: Option<i32>) {
        record(&mut self.memory, was, is_now);
    }

    /// Records a memory reservation change.
    pub fn record_memory_reservation(&mut self, was: Option<i32>, is_now: Option<i32>) {
        record(&mut self.memory_reservation, was, is_now);
    }

    /// Records an environment variable change.
    pub fn record_environment(
        &mut self,
        name: impl Into<String>,
        was: Option<String>,
        is_now: Option<String>,
    ) {
        match self.environment.entry(name.into()) {
            Entry::Occupied(mut entry) => entry.get_mut().change(was, is_now),
            Entry::Vacant(entry) => {
                entry.insert(ScalarDiff::new(was, is_now));
            }
        }
    }

    /// The CPU diff, if the patch set CPU.
    #[must_use]
    pub const fn cpu(&self) -> Option<&ScalarDiff<i32>> {
        self.cpu.as_ref()
    }

    /// The image diff, if the patch set the image.
    #[must_use]
    pub const fn image(&self) -> Option<&ScalarDiff<String>> {
        self.image.as_ref()
    }

    /// The memory diff, if the patch set memory.
    #[must_use]
    pub const fn memory(&self) -> Option<&ScalarDiff<i32>> {
        self.memory.as_ref()
    }

    /// The memory reservation diff, if the patch set it.
    #[must_use]
    pub const fn memory_reservation(&self) -> Option<&ScalarDiff<i32>> {
        self.memory_reservation.as_ref()
    }

    /// The diff for one environment variable.
    #[must_use]
    pub fn environment(&self, name: &str) -> Option<&ScalarDiff<String>> {
        self.environment.get(name)
    }
}

impl fmt::Display for ContainerDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        push_scalar(&mut parts, "cpu", self.cpu());
        push_scalar(&mut parts, "image", self.image());
        push_scalar(&mut parts, "memory", self.memory());
        push_scalar(&mut parts, "memoryReservation", self.memory_reservation());
        for (name, diff) in &self.environment {
            if !diff.is_empty() {
                parts.push(format!("environment variable \"{name}\" {diff}"));
            }
        }
        write!(f, "{}", parts.join("\n"))
    }
}

/// Changes applied to a task definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDiff {
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu: Option<ScalarDiff<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory: Option<ScalarDiff<String>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    container_definitions: BTreeMap<String, ContainerDiff>,
}

impl TaskDiff {
    /// Returns true if the patch changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        scalar_is_empty(self.cpu.as_ref())
            && scalar_is_empty(self.memory.as_ref())
            && self.container_definitions.values().all(ContainerDiff::is_empty)
    }

    /// Records a task CPU change.
    pub fn record_cpu(&mut self, was: Option<String>, is_now: Option<String>) {
        record(&mut self.cpu, was, is_now);
    }

    /// Records a task memory change.
    pub fn record_memory(&mut self, was: Option<String>, is_now: Option<String>) {
        record(&mut self.memory, was, is_now);
    }

    /// Records the diff of a container, replacing any previous one.
    pub fn record_container(&mut self, name: impl Into<String>, diff: ContainerDiff) {
        self.container_definitions.insert(name.into(), diff);
    }

    /// The task CPU diff, if the patch set CPU.
    #[must_use]
    pub const fn cpu(&self) -> Option<&ScalarDiff<String>> {
        self.cpu.as_ref()
    }

    /// The task memory diff, if the patch set memory.
    #[must_use]
    pub const fn memory(&self) -> Option<&ScalarDiff<String>> {
        self.memory.as_ref()
    }

    /// The diff of one container, if the patch touched it.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerDiff> {
        self.container_definitions.get(name)
    }
}

impl fmt::Display for TaskDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        push_scalar(&mut parts, "cpu", self.cpu());
        push_scalar(&mut parts, "memory", self.memory());
        for (name, diff) in &self.container_definitions {
            if !diff.is_empty() {
                parts.push(format!(
                    "the container definition \"{name}\" changed in this way:\n{diff}\n"
                ));
            }
        }
        write!(f, "{}", parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_scalar_emptiness_is_by_value() {
        assert!(ScalarDiff::<String>::new(None, None).is_empty());
        assert!(ScalarDiff::new(s("a"), s("a")).is_empty());
        assert!(!ScalarDiff::new(None, s("a")).is_empty());
        assert!(!ScalarDiff::new(s("a"), None).is_empty());
        assert!(!ScalarDiff::new(Some(1), Some(2)).is_empty());
    }

    #[test]
    fn test_scalar_rendering() {
        assert_eq!(
            ScalarDiff::new(s("old"), s("new")).to_string(),
            "was: \"old\" and now is: \"new\""
        );
        assert_eq!(
            ScalarDiff::new(None, s("x")).to_string(),
            "was: <nil> and now is: \"x\""
        );
        assert_eq!(
            ScalarDiff::new(s("x"), None).to_string(),
            "was: \"x\" and now is: <nil>"
        );
        assert_eq!(
            ScalarDiff::new(Some(128), Some(256)).to_string(),
            "was: 128 and now is: 256"
        );
        assert_eq!(ScalarDiff::new(Some(5), Some(5)).to_string(), "");
    }

    #[test]
    fn test_change_overwrites() {
        let mut diff = ScalarDiff::new(s("a"), s("b"));
        diff.change(s("b"), s("b"));
        assert!(diff.is_empty());
        assert_eq!(diff.was().map(String::as_str), Some("b"));
    }

    #[test]
    fn test_container_diff_rendering() {
        let mut diff = ContainerDiff::default();
        assert!(diff.is_empty());

        diff.record_cpu(Some(128), Some(128));
        diff.record_image(s("app:1"), s("app:2"));
        diff.record_memory_reservation(None, Some(64));
        diff.record_environment("K", s("old"), s("new"));
        diff.record_environment("SAME", s("v"), s("v"));

        assert!(!diff.is_empty());
        assert_eq!(
            diff.to_string(),
            "image was: \"app:1\" and now is: \"app:2\"\n\
             memoryReservation was: <nil> and now is: 64\n\
             environment variable \"K\" was: \"old\" and now is: \"new\""
        );
    }

    #[test]
    fn test_container_diff_empty_with_only_equal_values() {
        let mut diff = ContainerDiff::default();
        diff.record_memory(Some(256), Some(256));
        diff.record_environment("K", s("v"), s("v"));

        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "");
    }

    #[test]
    fn test_task_diff_rendering() {
        let mut app = ContainerDiff::default();
        app.record_image(s("app:1"), s("app:2"));

        let mut unchanged = ContainerDiff::default();
        unchanged.record_cpu(Some(1), Some(1));

        let mut diff = TaskDiff::default();
        diff.record_memory(s("512"), s("1024"));
        diff.record_cpu(s("256"), s("256"));
        diff.record_container("app", app);
        diff.record_container("sidecar", unchanged);

        assert!(!diff.is_empty());
        assert!(diff.container("sidecar").is_some_and(ContainerDiff::is_empty));
        assert_eq!(
            diff.to_string(),
            "memory was: \"512\" and now is: \"1024\"\n\
             the container definition \"app\" changed in this way:\n\
             image was: \"app:1\" and now is: \"app:2\"\n"
        );
    }

    #[test]
    fn test_empty_tree_renders_nothing() {
        let mut diff = TaskDiff::default();
        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "");

        diff.record_cpu(s("256"), s("256"));
        diff.record_container("app", ContainerDiff::default());
        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "");
    }

    #[test]
    fn test_json_skips_unset_fields() {
        let mut diff = TaskDiff::default();
        diff.record_cpu(s("256"), s("512"));

        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(json, serde_json::json!({"cpu": {"was": "256", "isNow": "512"}}));
    }
}
