use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Name of the config file picked up from the working directory.
pub const CONFIG_FILE_NAME: &str = "cloudstep.toml";

/// cloudstep.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// GCP project ID
    pub gcp_project_id: Option<String>,
    /// Cloud Run region (defaults to us-central1)
    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Override for the regional Cloud Run endpoint
    pub endpoint: Option<String>,
    /// Seconds between readiness checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Upper bound on the readiness wait
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            gcp_project_id: None,
            region: default_region(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RunConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StepConfig {
    /// Load from cloudstep.toml in the given directory, or return defaults if not found.
    pub fn load(dir: &Path) -> crate::Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load an explicitly named config file. A missing file is an error here.
    pub fn load_file(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Err(crate::Error::ConfigMissing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

fn default_region() -> String {
    "us-central1".to_owned()
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_timeout_secs() -> u64 {
    120
}
