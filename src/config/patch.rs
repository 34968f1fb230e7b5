//! Patch payload types.
//!
//! A [`TaskPatch`] is the partial set of overrides read from the updates
//! file. Every field is optional: an absent field leaves the task definition
//! untouched, a present one is applied (and recorded in the diff) even when
//! it equals the current value.
//!
//! ```yaml
//! cpu: "512"
//! memory: "1024"
//! containerDefinitions:
//!   app:
//!     image: registry.example.com/app:1.4.2
//!     memoryReservation: 256
//!     environment:
//!       LOG_LEVEL: debug
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Task-level overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    /// Task CPU units.
    #[serde(default, deserialize_with = "optional_lenient_string")]
    pub cpu: Option<String>,
    /// Task memory.
    #[serde(default, deserialize_with = "optional_lenient_string")]
    pub memory: Option<String>,
    /// Per-container overrides, keyed by container name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_definitions: BTreeMap<String, ContainerPatch>,
}

/// Container-level overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPatch {
    /// CPU units.
    #[serde(default)]
    pub cpu: Option<i32>,
    /// Hard memory limit in MiB.
    #[serde(default)]
    pub memory: Option<i32>,
    /// Soft memory limit in MiB.
    #[serde(default)]
    pub memory_reservation: Option<i32>,
    /// Image reference.
    #[serde(default)]
    pub image: Option<String>,
    /// Environment variables to set, by name.
    #[serde(default, deserialize_with = "lenient_string_map")]
    pub environment: BTreeMap<String, String>,
}

impl TaskPatch {
    /// Returns true if the patch overrides nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none()
            && self.memory.is_none()
            && self.container_definitions.values().all(ContainerPatch::is_empty)
    }

    /// Sets the task CPU override.
    #[must_use]
    pub fn with_cpu(mut self, cpu: impl Into<String>) -> Self {
        self.cpu = Some(cpu.into());
        self
    }

    /// Sets the task memory override.
    #[must_use]
    pub fn with_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = Some(memory.into());
        self
    }

    /// Adds overrides for a container.
    #[must_use]
    pub fn with_container(mut self, name: impl Into<String>, patch: ContainerPatch) -> Self {
        self.container_definitions.insert(name.into(), patch);
        self
    }
}

impl ContainerPatch {
    /// Returns true if the patch overrides nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cpu.is_none()
            && self.memory.is_none()
            && self.memory_reservation.is_none()
            && self.image.is_none()
            && self.environment.is_empty()
    }

    /// Sets the image override.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Sets an environment variable override.
    #[must_use]
    pub fn with_env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(name.into(), value.into());
        self
    }
}

/// A YAML scalar we are willing to read as a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientScalar {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<LenientScalar> for String {
    fn from(value: LenientScalar) -> Self {
        match value {
            LenientScalar::String(s) => s,
            LenientScalar::Integer(i) => i.to_string(),
            LenientScalar::Float(f) => f.to_string(),
            LenientScalar::Bool(b) => b.to_string(),
        }
    }
}

fn optional_lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LenientScalar>::deserialize(deserializer)?.map(String::from))
}

fn lenient_string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, LenientScalar>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, String::from(value)))
        .collect())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
