//! `chainsieve validate`, `query` and `run`.
//!
//! All three build the full plugin registry, validate the datasources they
//! touch (which also loads their ABIs), and then talk to handlers through
//! their JSON interface exactly like an indexer host would.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use chainsieve_core::{CollectingDiagnostics, HandlerContext, QuerySpec};
use chainsieve_observability::MeteredDiagnostics;

use crate::config::LoadedConfig;
use crate::plugins::default_registry;

pub fn validate(loaded: &LoadedConfig) -> Result<()> {
    let registry = default_registry();
    for (i, ds) in loaded.config.datasources.iter().enumerate() {
        let assets = loaded.assets(ds)?;
        registry
            .validate(ds, &assets)
            .with_context(|| format!("datasource #{i} ({})", ds.kind))?;
        println!("ok  #{i} {} ({} handlers)", ds.kind, ds.handlers.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct HandlerQuery<'a> {
    datasource: usize,
    handler: usize,
    kind: &'a str,
    query: Option<QuerySpec>,
}

pub fn query(loaded: &LoadedConfig, diagnostics: &MeteredDiagnostics<CollectingDiagnostics>) -> Result<()> {
    let registry = default_registry();
    let mut out = Vec::new();

    for (i, ds) in loaded.config.datasources.iter().enumerate() {
        let assets = loaded.assets(ds)?;
        registry
            .validate(ds, &assets)
            .with_context(|| format!("datasource #{i} ({})", ds.kind))?;

        let ctx = HandlerContext::new(ds, &assets, diagnostics);
        for (j, spec) in ds.handlers.iter().enumerate() {
            let query = registry.with_handler(ds, j, |handler| handler.query(&ctx, spec.filter.as_ref()))??;
            out.push(HandlerQuery {
                datasource: i,
                handler: j,
                kind: &spec.kind,
                query,
            });
        }
    }

    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

pub fn run(
    loaded: &LoadedConfig,
    datasource: usize,
    handler: usize,
    input_path: &Path,
    diagnostics: &MeteredDiagnostics<CollectingDiagnostics>,
) -> Result<()> {
    let registry = default_registry();
    let ds = loaded.datasource(datasource)?;
    let assets = loaded.assets(ds)?;
    registry
        .validate(ds, &assets)
        .with_context(|| format!("datasource #{datasource} ({})", ds.kind))?;

    let raw = std::fs::read_to_string(input_path)
        .with_context(|| format!("read input '{}'", input_path.display()))?;
    let input: Value = serde_json::from_str(&raw).context("parse input JSON")?;

    let ctx = HandlerContext::new(ds, &assets, diagnostics);
    let filter = ds.handler_filter(handler);

    let records = registry.with_handler(ds, handler, |h| -> Result<Vec<Value>> {
        let matched = h.filter(&ctx, filter, &input)?;
        diagnostics.metrics().record_filter(h.kind(), matched);
        tracing::info!(kind = h.kind(), matched, "filtered record");
        if !matched {
            return Ok(Vec::new());
        }
        Ok(h.transform(&ctx, filter, &input)?)
    })??;

    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
