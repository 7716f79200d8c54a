//! Plugin registry: maps datasource kinds to their plugins.

use std::collections::HashMap;
use std::sync::Arc;

use crate::datasource::{AssetMap, Datasource};
use crate::error::SieveError;
use crate::processor::{DatasourcePlugin, DynHandler};

/// Datasource plugins keyed by kind. Built once at startup, read-only
/// afterwards.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    by_kind: HashMap<&'static str, Arc<dyn DatasourcePlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A later plugin with the same kind replaces the
    /// earlier one.
    pub fn register(&mut self, plugin: Arc<dyn DatasourcePlugin>) {
        tracing::debug!(kind = plugin.kind(), handlers = ?plugin.handler_kinds(), "registered datasource plugin");
        self.by_kind.insert(plugin.kind(), plugin);
    }

    pub fn with(mut self, plugin: Arc<dyn DatasourcePlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn DatasourcePlugin>> {
        self.by_kind.get(kind).cloned()
    }

    /// The plugin that owns `ds`.
    pub fn plugin_for(&self, ds: &Datasource) -> Result<Arc<dyn DatasourcePlugin>, SieveError> {
        self.by_kind
            .values()
            .find(|p| p.ds_filter_processor(ds))
            .cloned()
            .ok_or_else(|| SieveError::UnknownKind {
                what: "datasource",
                kind: ds.kind.clone(),
            })
    }

    /// Validate `ds` against its plugin; every registration-time failure
    /// aborts activation.
    pub fn validate(&self, ds: &Datasource, assets: &AssetMap) -> Result<(), SieveError> {
        let plugin = self.plugin_for(ds)?;
        plugin.validate_datasource(ds, assets)?;
        tracing::info!(kind = %ds.kind, handlers = ds.handlers.len(), "datasource validated");
        Ok(())
    }

    /// Look up the handler named by `ds.handlers[index]`.
    pub fn with_handler<R>(
        &self,
        ds: &Datasource,
        index: usize,
        f: impl FnOnce(&dyn DynHandler) -> R,
    ) -> Result<R, SieveError> {
        let plugin = self.plugin_for(ds)?;
        let spec = ds.handlers.get(index).ok_or_else(|| SieveError::UnknownKind {
            what: "handler",
            kind: format!("#{index}"),
        })?;
        let handler = plugin.handler(&spec.kind).ok_or_else(|| SieveError::UnknownKind {
            what: "handler",
            kind: spec.kind.clone(),
        })?;
        Ok(f(handler))
    }

    /// Registered datasource kinds, sorted.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.by_kind.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DatasourceOptions;
    use crate::processor::{HandlerContext, HandlerProcessor};
    use crate::query::QuerySpec;
    use crate::datasource::HandlerSpec;
    use serde_json::Value;

    struct Noop;

    impl HandlerProcessor for Noop {
        type Filter = ();
        type Input = Value;
        type Output = Value;

        fn kind(&self) -> &'static str {
            "test/NoopEvent"
        }
        fn filter_validator(&self, raw: Option<&Value>) -> Result<(), SieveError> {
            match raw {
                Some(v) if !v.is_null() => Err(SieveError::InvalidFilterSpec {
                    kind: "event".into(),
                    violations: vec![],
                }),
                _ => Ok(()),
            }
        }
        fn filter_processor(&self, _: &HandlerContext<'_>, _: &(), _: &Value) -> bool {
            true
        }
        fn transformer(&self, _: &HandlerContext<'_>, _: &(), input: &Value) -> Result<Vec<Value>, SieveError> {
            Ok(vec![input.clone()])
        }
        fn dictionary_query(&self, _: &HandlerContext<'_>, _: &()) -> Option<QuerySpec> {
            None
        }
    }

    struct NoopPlugin {
        event: Noop,
    }

    impl DatasourcePlugin for NoopPlugin {
        fn kind(&self) -> &'static str {
            "test/Noop"
        }
        fn validate(&self, _: &Datasource, _: &AssetMap) -> Result<(), SieveError> {
            Ok(())
        }
        fn handler(&self, kind: &str) -> Option<&dyn DynHandler> {
            (kind == "test/NoopEvent").then_some(&self.event as &dyn DynHandler)
        }
        fn handler_kinds(&self) -> Vec<&'static str> {
            vec!["test/NoopEvent"]
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new().with(Arc::new(NoopPlugin { event: Noop }))
    }

    #[test]
    fn finds_plugin_by_kind() {
        let reg = registry();
        assert_eq!(reg.kinds(), vec!["test/Noop"]);
        let ds = Datasource::new("test/Noop", DatasourceOptions::default());
        assert!(reg.plugin_for(&ds).is_ok());

        let other = Datasource::new("test/Other", DatasourceOptions::default());
        assert!(matches!(
            reg.plugin_for(&other),
            Err(SieveError::UnknownKind { what: "datasource", .. })
        ));
    }

    #[test]
    fn validate_checks_each_handler() {
        let reg = registry();
        let mut ds = Datasource::new("test/Noop", DatasourceOptions::default());
        ds.handlers.push(HandlerSpec {
            kind: "test/NoopEvent".into(),
            filter: None,
            handler: None,
        });
        assert!(reg.validate(&ds, &AssetMap::new()).is_ok());

        ds.handlers[0].filter = Some(serde_json::json!({"topics": []}));
        assert!(reg.validate(&ds, &AssetMap::new()).unwrap_err().is_registration_error());

        ds.handlers[0].kind = "test/NoopCall".into();
        assert!(matches!(
            reg.validate(&ds, &AssetMap::new()),
            Err(SieveError::UnknownKind { what: "handler", .. })
        ));
    }
}
