//! Datasource manifests and the asset map.
//!
//! A datasource names its flavor (`kind`), processor options, the asset
//! files it references and the handlers that run against it. Manifests are
//! read from YAML or JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SieveError;
use crate::options::DatasourceOptions;

/// One handler attached to a datasource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSpec {
    /// Handler kind, e.g. `substrate/AcalaEvmEvent`.
    pub kind: String,
    /// Raw filter object; validated by the handler's processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Name of the host mapping function.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

/// A custom datasource as declared in a project manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datasource {
    pub kind: String,
    #[serde(default)]
    pub options: DatasourceOptions,
    /// Asset name → file path, relative to the manifest.
    #[serde(default)]
    pub assets: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub handlers: Vec<HandlerSpec>,
}

impl Datasource {
    pub fn new(kind: impl Into<String>, options: DatasourceOptions) -> Self {
        Self {
            kind: kind.into(),
            options,
            assets: BTreeMap::new(),
            handlers: Vec::new(),
        }
    }

    pub fn from_yaml(src: &str) -> Result<Self, SieveError> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn from_json(src: &str) -> Result<Self, SieveError> {
        Ok(serde_json::from_str(src)?)
    }

    /// Raw filter of handler `index`, if both exist.
    pub fn handler_filter(&self, index: usize) -> Option<&Value> {
        self.handlers.get(index).and_then(|h| h.filter.as_ref())
    }
}

/// Asset contents keyed by logical name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    inner: BTreeMap<String, String>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every asset `ds` references. Relative paths resolve against
    /// `base_dir`.
    pub fn load(ds: &Datasource, base_dir: &Path) -> Result<Self, SieveError> {
        let mut inner = BTreeMap::new();
        for (name, path) in &ds.assets {
            let full = if path.is_absolute() {
                path.clone()
            } else {
                base_dir.join(path)
            };
            let content = std::fs::read_to_string(&full)?;
            tracing::debug!(asset = %name, path = %full.display(), bytes = content.len(), "loaded asset");
            inner.insert(name.clone(), content);
        }
        Ok(Self { inner })
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            inner: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.inner.insert(name.into(), content.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The ABI asset named by `options.abi`, as `(name, content)`.
///
/// `Ok(None)` when no ABI is configured. A configured name with no asset
/// behind it is `AbiNotReferenced`.
pub fn resolve_abi_asset<'a>(
    options: &'a DatasourceOptions,
    assets: &'a AssetMap,
) -> Result<Option<(&'a str, &'a str)>, SieveError> {
    let Some(name) = options.abi.as_deref() else {
        return Ok(None);
    };
    match assets.get(name) {
        Some(content) => Ok(Some((name, content))),
        None => Err(SieveError::AbiNotReferenced {
            name: name.to_string(),
        }),
    }
}
