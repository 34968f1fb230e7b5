//! Loading of the updates payload.
//!
//! The payload is YAML (JSON works too, being a subset) and comes either from
//! a file or from standard input when the source is `-`.

use crate::error::{ConfigError, Result, ShipError};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::patch::TaskPatch;

/// Payload source meaning standard input.
pub const STDIN_SOURCE: &str = "-";

/// Parser for the updates payload.
#[derive(Debug, Default)]
pub struct PatchParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl PatchParser {
    /// Creates a new payload parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads the payload from `source`, where `-` means standard input.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or parsed.
    pub fn load(&self, source: &str) -> Result<TaskPatch> {
        if source == STDIN_SOURCE {
            self.load_reader(std::io::stdin().lock(), "stdin")
        } else {
            self.load_file(self.resolve(source))
        }
    }

    /// Loads the payload from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<TaskPatch> {
        let path = path.as_ref();
        info!("Loading updates from: {}", path.display());

        if !path.exists() {
            return Err(ShipError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ShipError::Config(ConfigError::ReadFailed {
                source_name: path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Loads the payload from any reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader fails or the content cannot be parsed.
    pub fn load_reader(&self, mut reader: impl Read, source_name: &str) -> Result<TaskPatch> {
        debug!("Reading updates from {source_name}");

        let mut content = String::new();
        reader.read_to_string(&mut content).map_err(|e| {
            ShipError::Config(ConfigError::ReadFailed {
                source_name: source_name.to_string(),
                message: e.to_string(),
            })
        })?;

        self.parse_yaml(&content, None)
    }

    /// Parses the payload from a YAML string.
    ///
    /// An empty document is an empty patch.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or does not have the patch shape.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<TaskPatch> {
        debug!("Parsing updates payload");

        if content.trim().is_empty() {
            return Ok(TaskPatch::default());
        }

        let patch: TaskPatch = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            ShipError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed updates for {} container(s)",
            patch.container_definitions.len()
        );
        Ok(patch)
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ShipError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves a relative payload path against the base path.
    fn resolve(&self, source: &str) -> PathBuf {
        let path = PathBuf::from(source);
        match &self.base_path {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}
