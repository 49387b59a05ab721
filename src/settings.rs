use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "WIKISPLIT";
const DEFAULT_MAX_IN_FLIGHT: usize = 64;
const DEFAULT_QUEUE_DEPTH: usize = 256;
const DEFAULT_SPLIT_DIR: &str = "media-wiki-dump-splitted";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Upper bound on concurrently running file writes.
    pub max_in_flight: usize,
    /// Records the scanner may queue ahead of the writers.
    pub queue_depth: usize,
    /// Sub-directory of the output directory that receives the files.
    /// Empty means the output directory itself.
    pub split_dir: String,
}

impl Settings {
    /// Defaults, overridden by `WIKISPLIT_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self> {
        let defaults = Settings::default();
        let settings: Settings = Config::builder()
            .set_default("max_in_flight", defaults.max_in_flight as i64)?
            .set_default("queue_depth", defaults.queue_depth as i64)?
            .set_default("split_dir", defaults.split_dir)?
            .add_source(env)
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line values on top of the environment.
    pub fn with_overrides(
        mut self,
        max_in_flight: Option<usize>,
        split_dir: Option<String>,
    ) -> Result<Self> {
        if let Some(n) = max_in_flight {
            self.max_in_flight = n;
        }
        if let Some(dir) = split_dir {
            self.split_dir = dir;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn target_dir(&self, out_dir: &Path) -> PathBuf {
        if self.split_dir.is_empty() {
            out_dir.to_path_buf()
        } else {
            out_dir.join(&self.split_dir)
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_in_flight == 0 {
            bail!("max_in_flight must be at least 1");
        }
        if self.queue_depth == 0 {
            bail!("queue_depth must be at least 1");
        }
        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            split_dir: DEFAULT_SPLIT_DIR.to_string(),
        }
    }
}
