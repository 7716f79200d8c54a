//! Project configuration: logging plus the datasources to work with.
//!
//! ```yaml
//! log:
//!   level: info
//!   components:
//!     chainsieve-wasm: debug
//! datasources:
//!   - kind: substrate/Wasm
//!     options:
//!       abi: erc20
//!       contract: 5GdHQQkRHvEEE4sDkcLkxCCumSkw2SFBJSLKzbMTNARLTXz3
//!     assets:
//!       erc20: ./erc20.metadata.json
//!     handlers:
//!       - kind: substrate/WasmEvent
//!         filter:
//!           identifier: Transfer
//! ```

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use chainsieve_core::{AssetMap, Datasource};
use chainsieve_observability::LogConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub datasources: Vec<Datasource>,
}

/// A loaded config together with the directory its asset paths are
/// relative to.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProjectConfig,
    pub base_dir: PathBuf,
}

impl ProjectConfig {
    /// YAML unless the file ends in `.json`.
    pub fn parse(src: &str, json: bool) -> Result<Self> {
        if json {
            serde_json::from_str(src).context("parse JSON config")
        } else {
            serde_yaml::from_str(src).context("parse YAML config")
        }
    }

    pub fn load(path: &Path) -> Result<LoadedConfig> {
        let src = std::fs::read_to_string(path).with_context(|| format!("read config '{}'", path.display()))?;
        let json = path.extension().is_some_and(|ext| ext == "json");
        let config = Self::parse(&src, json).with_context(|| format!("in '{}'", path.display()))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        tracing::debug!(path = %path.display(), datasources = config.datasources.len(), "loaded project config");
        Ok(LoadedConfig { config, base_dir })
    }
}

impl LoadedConfig {
    pub fn datasource(&self, index: usize) -> Result<&Datasource> {
        self.config.datasources.get(index).ok_or_else(|| {
            anyhow!(
                "datasource #{index} does not exist (config has {})",
                self.config.datasources.len()
            )
        })
    }

    pub fn assets(&self, ds: &Datasource) -> Result<AssetMap> {
        AssetMap::load(ds, &self.base_dir).with_context(|| format!("load assets of {}", ds.kind))
    }
}
