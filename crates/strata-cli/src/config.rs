use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use strata_schema::{ReaderOptions, WriterConfig};
use strata_types::HashAlgorithm;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "strata.toml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    pub store_root: PathBuf,
    pub hash_algorithm: HashAlgorithm,
    pub writer: WriterConfig,
    pub reader: ReaderOptions,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(".strata"),
            hash_algorithm: HashAlgorithm::default(),
            writer: WriterConfig::default(),
            reader: ReaderOptions::default(),
        }
    }
}

impl StrataConfig {
    /// Load `path`, or `./strata.toml` if it exists, or fall back to the
    /// defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !local.exists() {
                    return Ok(Self::default());
                }
                local
            }
        };
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.writer.validate()?;
        anyhow::ensure!(
            config.writer.max_depth <= config.reader.max_depth,
            "writer.max_depth {} exceeds reader.max_depth {}; written files would be unreadable",
            config.writer.max_depth,
            config.reader.max_depth
        );
        Ok(config)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
