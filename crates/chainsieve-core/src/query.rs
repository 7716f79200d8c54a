//! Dictionary query synthesis.
//!
//! A dictionary query is a list of field/value equality conditions sent to
//! an external index so the host only fetches candidate blocks.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::SieveError;
use crate::filter::LogFilter;
use crate::hexutil::is_hex_string;
use crate::options::DatasourceOptions;

/// One equality condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryCondition {
    pub field: String,
    pub value: String,
}

impl QueryCondition {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// `{ entity, conditions: [{field, value}] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub entity: String,
    pub conditions: Vec<QueryCondition>,
}

impl QuerySpec {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            conditions: Vec::new(),
        }
    }

    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.conditions.push(QueryCondition::new(field, value));
    }

    pub fn value_of(&self, field: &str) -> Option<&str> {
        self.conditions
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.value.as_str())
    }
}

/// Entity names understood by the dictionary service.
pub mod entity {
    pub const EVM_LOGS: &str = "evmLogs";
    pub const EVM_TRANSACTIONS: &str = "evmTransactions";
    pub const CONTRACT_EMITTEDS: &str = "contractEmitteds";
    pub const CONTRACTS_CALLS: &str = "contractsCalls";
}

/// Field layout of a call query entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallQueryLayout {
    pub entity: &'static str,
    pub target_field: &'static str,
    pub selector_field: &'static str,
}

pub const EVM_CALL_LAYOUT: CallQueryLayout = CallQueryLayout {
    entity: entity::EVM_TRANSACTIONS,
    target_field: "to",
    selector_field: "func",
};

pub const WASM_CALL_LAYOUT: CallQueryLayout = CallQueryLayout {
    entity: entity::CONTRACTS_CALLS,
    target_field: "dest",
    selector_field: "selector",
};

/// Call filter fields relevant to a dictionary query.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallQueryInput<'a> {
    pub target: Option<&'a str>,
    pub from: Option<&'a str>,
    pub selector: Option<&'a str>,
    pub method: Option<&'a str>,
}

/// Log query: `None` without a configured address, otherwise the
/// lower-cased address followed by `topics{i}` for every non-wildcard slot.
pub fn build_log_query(
    filter: Option<&LogFilter>,
    options: &DatasourceOptions,
) -> Result<Option<QuerySpec>, SieveError> {
    let Some(address) = options.evm_address() else {
        return Ok(None);
    };

    let mut query = QuerySpec::new(entity::EVM_LOGS);
    query.push("address", address.to_lowercase());

    if let Some(filter) = filter {
        for (i, topic) in filter.resolved_topics()? {
            query.push(format!("topics{i}"), topic);
        }
    }
    Ok(Some(query))
}

/// Call query with selector/method precedence.
///
/// `resolve_method` maps a method token to its selector. When both a
/// selector and a method are given and disagree, the explicit selector wins;
/// an unresolvable method is dropped. Both cases emit a diagnostic.
pub fn build_call_query<F>(
    layout: CallQueryLayout,
    input: CallQueryInput<'_>,
    resolve_method: F,
    diagnostics: &dyn Diagnostics,
) -> QuerySpec
where
    F: FnOnce(&str) -> Option<String>,
{
    let mut query = QuerySpec::new(layout.entity);

    if let Some(target) = input.target.filter(|t| !t.is_empty()) {
        query.push(layout.target_field, account_value(target));
    }
    if let Some(from) = input.from.filter(|f| !f.is_empty()) {
        query.push("from", account_value(from));
    }

    let selector = input.selector.filter(|s| !s.is_empty());
    if let Some(selector) = selector {
        query.push(layout.selector_field, selector);
    }

    if let Some(method) = input.method.filter(|m| !m.is_empty()) {
        match resolve_method(method) {
            None => diagnostics.emit(
                DiagnosticKind::QueryConditionDropped,
                &format!("Unable to resolve method '{method}', it will be omitted from the dictionary query"),
            ),
            Some(resolved) => match selector {
                Some(explicit) if !explicit.eq_ignore_ascii_case(&resolved) => diagnostics.emit(
                    DiagnosticKind::QueryConditionDropped,
                    &format!(
                        "Method '{method}' resolves to selector {resolved} which does not match selector {explicit}; only the selector is applied"
                    ),
                ),
                Some(_) => {}
                None => query.push(layout.selector_field, resolved),
            },
        }
    }

    query
}

/// Hex accounts are indexed lower-case; SS58 accounts are case-sensitive
/// and kept as given.
pub fn account_value(account: &str) -> String {
    if is_hex_string(account) {
        account.to_lowercase()
    } else {
        account.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::signature::function_signature_to_selector;

    const ADDR: &str = "0x220866B1A2219f40e72f5c628B65D54268cA3A9D";

    #[test]
    fn log_query_requires_address() {
        let filter = LogFilter::with_topics([None::<&str>, None]);
        assert_eq!(build_log_query(Some(&filter), &DatasourceOptions::default()).unwrap(), None);
        assert_eq!(build_log_query(None, &DatasourceOptions::default()).unwrap(), None);
    }

    #[test]
    fn log_query_lowercases_address_and_skips_wildcards() {
        let opts = DatasourceOptions {
            address: Some(ADDR.into()),
            ..Default::default()
        };
        let filter = LogFilter::with_topics([
            Some("Transfer(address indexed from, address indexed to, uint256 value)"),
            None,
            Some("0x000000000000000000000000220866b1a2219f40e72f5c628b65d54268ca3a9d"),
        ]);
        let q = build_log_query(Some(&filter), &opts).unwrap().unwrap();
        assert_eq!(q.entity, "evmLogs");
        assert_eq!(q.conditions.len(), 3);
        assert_eq!(q.value_of("address"), Some(ADDR.to_lowercase().as_str()));
        assert_eq!(
            q.value_of("topics0"),
            Some("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
        );
        assert!(q.value_of("topics1").is_none());
        assert!(q.value_of("topics2").is_some());
    }

    #[test]
    fn evm_call_query_fields() {
        let diag = CollectingDiagnostics::new();
        let q = build_call_query(
            EVM_CALL_LAYOUT,
            CallQueryInput {
                target: Some(ADDR),
                from: Some("0xABCDEF0000000000000000000000000000000001"),
                method: Some("transfer(address,uint256)"),
                ..Default::default()
            },
            |m| function_signature_to_selector(m).ok(),
            &diag,
        );
        assert_eq!(q.entity, "evmTransactions");
        assert_eq!(q.value_of("to"), Some(ADDR.to_lowercase().as_str()));
        assert_eq!(q.value_of("from"), Some("0xabcdef0000000000000000000000000000000001"));
        assert_eq!(q.value_of("func"), Some("0xa9059cbb"));
        assert!(diag.is_empty());
    }

    #[test]
    fn explicit_selector_wins_over_disagreeing_method() {
        let diag = CollectingDiagnostics::new();
        let q = build_call_query(
            WASM_CALL_LAYOUT,
            CallQueryInput {
                selector: Some("0x633aa551"),
                method: Some("get"),
                ..Default::default()
            },
            |_| Some("0x2f865bd9".to_string()),
            &diag,
        );
        assert_eq!(q.conditions, vec![QueryCondition::new("selector", "0x633aa551")]);
        assert_eq!(diag.count(DiagnosticKind::QueryConditionDropped), 1);
    }

    #[test]
    fn agreeing_method_is_not_duplicated() {
        let diag = CollectingDiagnostics::new();
        let q = build_call_query(
            WASM_CALL_LAYOUT,
            CallQueryInput {
                selector: Some("0x633aa551"),
                method: Some("flip"),
                ..Default::default()
            },
            |_| Some("0x633AA551".to_string()),
            &diag,
        );
        assert_eq!(q.conditions.len(), 1);
        assert!(diag.is_empty());
    }

    #[test]
    fn unresolvable_method_dropped() {
        let diag = CollectingDiagnostics::new();
        let q = build_call_query(
            WASM_CALL_LAYOUT,
            CallQueryInput {
                target: Some("Yi7XDNj695kuHY9ZmtH4YWeBrwTFWo6YMi4YnLstvjUVVfK"),
                method: Some("nope"),
                ..Default::default()
            },
            |_| None,
            &diag,
        );
        assert_eq!(q.conditions.len(), 1);
        assert_eq!(
            q.conditions[0],
            QueryCondition::new("dest", "Yi7XDNj695kuHY9ZmtH4YWeBrwTFWo6YMi4YnLstvjUVVfK")
        );
        assert_eq!(diag.count(DiagnosticKind::QueryConditionDropped), 1);
    }
}
