//! Directory-backed file sink.

use std::path::{Path, PathBuf};

#[cfg(feature = "config")]
use clap::Args;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use super::{FileSink, TRACING_TARGET};
use crate::content::StepContent;
use crate::engine::DataStep;
use crate::error::{RuntimeError, RuntimeResult};
use crate::graph::Node;

/// Width of the separator line written around each header.
const SEPARATOR_WIDTH: usize = 50;

/// Configuration for [`DirectorySink`].
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DirectorySinkConfig {
    /// Directory that file nodes resolve into.
    #[cfg_attr(
        feature = "config",
        arg(long = "memory-dir", env = "SIMNET_MEMORY_DIR", default_value = "memory")
    )]
    #[builder(default = "default_base_dir()")]
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// File name used for file nodes without a name.
    #[cfg_attr(
        feature = "config",
        arg(
            long = "memory-default-file",
            env = "SIMNET_MEMORY_DEFAULT_FILE",
            default_value = "memory_output.txt"
        )
    )]
    #[builder(default = "default_file_name()")]
    #[serde(default = "default_file_name")]
    pub default_file_name: String,
}

fn default_base_dir() -> PathBuf {
    PathBuf::from("memory")
}

fn default_file_name() -> String {
    "memory_output.txt".into()
}

impl DirectorySinkConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.default_file_name
            && Path::new(name).file_name().is_none()
        {
            return Err("default_file_name must be a plain file name".into());
        }
        Ok(())
    }
}

impl Default for DirectorySinkConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            default_file_name: default_file_name(),
        }
    }
}

impl DirectorySinkConfig {
    /// Returns the path a file node writes to.
    ///
    /// The node name is the file name: `.json` is appended to extensionless
    /// names mentioning goals or plans, `.txt` to other extensionless names.
    /// Directory components in the name are ignored.
    pub fn file_path(&self, file: &Node) -> PathBuf {
        let name = Path::new(file.name.trim())
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty());

        let Some(name) = name else {
            return self.base_dir.join(&self.default_file_name);
        };

        if Path::new(name).extension().is_some() {
            return self.base_dir.join(name);
        }

        let lowercase = name.to_lowercase();
        let extension = if lowercase.contains("goals") || lowercase.contains("plans") {
            "json"
        } else {
            "txt"
        };

        self.base_dir.join(format!("{name}.{extension}"))
    }
}

/// File sink appending model output to files under a base directory.
#[derive(Debug, Clone, Default)]
pub struct DirectorySink {
    config: DirectorySinkConfig,
}

impl DirectorySink {
    /// Creates a sink with the given configuration.
    pub fn new(config: DirectorySinkConfig) -> Self {
        Self { config }
    }

    /// Creates a sink writing into `base_dir` with default settings.
    pub fn in_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySinkConfig {
            base_dir: base_dir.into(),
            ..Default::default()
        })
    }

    /// Returns the sink configuration.
    pub fn config(&self) -> &DirectorySinkConfig {
        &self.config
    }

    fn entry(source: &Node, step: DataStep, content: &StepContent) -> String {
        let separator = "=".repeat(SEPARATOR_WIDTH);
        let timestamp = jiff::Zoned::now().strftime("%Y-%m-%d %H:%M:%S");

        format!(
            "\n{separator}\n[{timestamp}] Output from Model: {} (Step {step})\n{separator}\n{}\n",
            source.name, content.value
        )
    }
}

#[async_trait::async_trait]
impl FileSink for DirectorySink {
    async fn append(
        &self,
        file: &Node,
        source: &Node,
        step: DataStep,
        content: &StepContent,
    ) -> RuntimeResult<String> {
        let path = self.config.file_path(file);
        tokio::fs::create_dir_all(&self.config.base_dir).await?;

        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        handle
            .write_all(Self::entry(source, step, content).as_bytes())
            .await?;
        handle.flush().await?;

        let location = path.to_str().map(str::to_owned).ok_or_else(|| {
            RuntimeError::InvalidConfig(format!("non UTF-8 file path: {}", path.display()))
        })?;

        tracing::debug!(
            target: TRACING_TARGET,
            file_node = %file.id,
            source_node = %source.id,
            path = %location,
            step = step.get(),
            "Appended model output to file node"
        );

        Ok(location)
    }
}
