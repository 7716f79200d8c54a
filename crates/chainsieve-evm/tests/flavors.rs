//! Fixture-driven tests for the Acala and Frontier plugins.
//!
//! Each test loads a host-shaped JSON record from `tests/fixtures/`, runs it
//! through a plugin exactly as the indexer host would, and checks the
//! canonical records that come out.

use chainsieve_core::{
    AssetMap, CollectingDiagnostics, DatasourceOptions, DatasourcePlugin, DiagnosticKind, Datasource,
    HandlerContext, HandlerProcessor, HandlerSpec, NormalizedValue, PluginRegistry, SieveError,
};
use chainsieve_core::raw::{SubstrateCall, SubstrateEvent};
use chainsieve_evm::{acala_plugin, frontier_plugin, moonbeam_plugin};
use serde_json::{json, Value};
use std::sync::Arc;

// ─── Helpers ──────────────────────────────────────────────────────────────────

const TRANSFER: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const ACALA_TOKEN: &str = "0x0000000000000000000100000000000000000000";
const MOONBEAM_TOKEN: &str = "0x220866b1a2219f40e72f5c628b65d54268ca3a9d";
const MOONBEAM_SENDER: &str = "0x6be02d1d3665660d22ff9624b7be0551ee1ac91b";

fn fixture_path(name: &str) -> std::path::PathBuf {
    let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.push("tests");
    p.push("fixtures");
    p.push(name);
    p
}

fn load_fixture(name: &str) -> Value {
    let path = fixture_path(name);
    let content = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("bad fixture {name}: {e}"))
}

fn erc20_assets() -> AssetMap {
    let abi = std::fs::read_to_string(fixture_path("erc20.abi.json")).unwrap();
    AssetMap::from_pairs([("erc20", abi)])
}

fn datasource(kind: &str, address: Option<&str>) -> Datasource {
    Datasource::new(
        kind,
        DatasourceOptions {
            abi: Some("erc20".into()),
            address: address.map(str::to_string),
            ..Default::default()
        },
    )
}

/// The `evm.Log` event of the Frontier transact fixture, as an event input.
fn frontier_log_event() -> Value {
    let call = load_fixture("frontier_transact_call.json");
    json!({
        "block": call["block"],
        "event": call["extrinsic"]["events"][0],
        "extrinsic": call["extrinsic"],
    })
}

// ─── Acala ────────────────────────────────────────────────────────────────────

#[test]
fn acala_packed_logs_filtered_individually() {
    let plugin = acala_plugin();
    let ds = datasource("substrate/AcalaEvm", Some(ACALA_TOKEN));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let processor = plugin.event_processor();
    let filter = processor
        .filter_validator(Some(&json!({"topics": ["Transfer(address indexed from, address indexed to, uint256 value)"]})))
        .unwrap();
    let input: SubstrateEvent = serde_json::from_value(load_fixture("acala_executed_event.json")).unwrap();

    assert!(processor.filter_processor(&ctx, &filter, &input));
    let logs = processor.transformer(&ctx, &filter, &input).unwrap();

    // Approval and the foreign-contract Transfer are dropped
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].log_index, 0);
    assert_eq!(logs[1].log_index, 1);
    for log in &logs {
        assert_eq!(log.topics[0], TRANSFER);
        assert_eq!(log.address, ACALA_TOKEN);
        assert_eq!(log.block_number, 1_102_030);
        assert_eq!(log.transaction_index, 3);
        assert_eq!(
            log.transaction_hash.as_deref(),
            Some("0x3f0d2a8e1b7c6d5e4f3a2b1c0d9e8f7a6b5c4d3e2f1a0b9c8d7e6f5a4b3c2d1e")
        );
        assert_eq!(log.from.as_deref(), Some("0x75e480db528101a381ce68544611c169ad7eb342"));
    }

    let values: Vec<_> = logs
        .iter()
        .map(|l| l.args.as_ref().and_then(|a| a.get("value")).and_then(NormalizedValue::as_u128))
        .collect();
    assert_eq!(values, vec![Some(1000), Some(500)]);
    assert!(diag.is_empty(), "{:?}", diag.entries());
}

#[test]
fn acala_log_with_extra_topics_is_skipped() {
    let plugin = acala_plugin();
    let ds = datasource("substrate/AcalaEvm", Some(ACALA_TOKEN));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let mut raw = load_fixture("acala_executed_event.json");
    let topics = raw["event"]["data"][2][0]["topics"].as_array_mut().unwrap();
    topics.push(json!(format!("0x{:064x}", 1)));
    topics.push(json!(format!("0x{:064x}", 2)));
    let input: SubstrateEvent = serde_json::from_value(raw).unwrap();

    let processor = plugin.event_processor();
    let filter = processor
        .filter_validator(Some(&json!({"topics": ["Transfer(address,address,uint256)"]})))
        .unwrap();
    let logs = processor.transformer(&ctx, &filter, &input).unwrap();

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].log_index, 0);
    assert_eq!(
        logs[0].args.as_ref().and_then(|a| a.get("value")).and_then(NormalizedValue::as_u128),
        Some(500)
    );
    assert_eq!(diag.count(DiagnosticKind::MalformedInput), 1);
}

#[test]
fn acala_without_topics_keeps_every_log_of_the_contract() {
    let plugin = acala_plugin();
    let ds = datasource("substrate/AcalaEvm", Some(ACALA_TOKEN));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let processor = plugin.event_processor();
    let filter = processor.filter_validator(None).unwrap();
    let input: SubstrateEvent = serde_json::from_value(load_fixture("acala_executed_event.json")).unwrap();

    let logs = processor.transformer(&ctx, &filter, &input).unwrap();
    assert_eq!(logs.len(), 3);
    assert_eq!(logs.iter().map(|l| l.log_index).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[test]
fn acala_other_contract_does_not_match() {
    let plugin = acala_plugin();
    let ds = datasource("substrate/AcalaEvm", Some("0x00000000000000000001000000000000000000ff"));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let processor = plugin.event_processor();
    let filter = processor.filter_validator(None).unwrap();
    let input: SubstrateEvent = serde_json::from_value(load_fixture("acala_executed_event.json")).unwrap();
    assert!(!processor.filter_processor(&ctx, &filter, &input));
}

#[test]
fn acala_event_query_uses_lowercase_address_and_topic() {
    let plugin = acala_plugin();
    let ds = datasource("substrate/AcalaEvm", Some("0x0000000000000000000100000000000000000000"));
    let assets = AssetMap::new();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);
    let handler = plugin.handler("substrate/AcalaEvmEvent").unwrap();
    let query = handler
        .query(&ctx, Some(&json!({"topics": ["Transfer(address,address,uint256)"]})))
        .unwrap()
        .unwrap();
    assert_eq!(query.entity, "evmLogs");
    assert_eq!(query.value_of("address"), Some(ACALA_TOKEN));
    assert_eq!(query.value_of("topics0"), Some(TRANSFER));
}

// ─── Frontier / Moonbeam ──────────────────────────────────────────────────────

#[test]
fn moonbeam_call_through_registry() {
    let registry = PluginRegistry::new()
        .with(Arc::new(acala_plugin()))
        .with(Arc::new(frontier_plugin()))
        .with(Arc::new(moonbeam_plugin()));

    let mut ds = datasource("substrate/Moonbeam", Some(MOONBEAM_TOKEN));
    ds.handlers.push(HandlerSpec {
        kind: "substrate/MoonbeamCall".into(),
        filter: Some(json!({"function": "mint(address,uint256)"})),
        handler: Some("handleMint".into()),
    });
    let assets = erc20_assets();
    registry.validate(&ds, &assets).unwrap();

    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);
    let input = load_fixture("frontier_transact_call.json");

    let records = registry
        .with_handler(&ds, 0, |h| {
            assert!(h.filter(&ctx, ds.handler_filter(0), &input).unwrap());
            h.transform(&ctx, ds.handler_filter(0), &input)
        })
        .unwrap()
        .unwrap();

    assert_eq!(records.len(), 1);
    let call = &records[0];
    assert_eq!(call["from"], MOONBEAM_SENDER);
    assert_eq!(call["to"], MOONBEAM_TOKEN);
    assert_eq!(call["hash"], "0x5ab2a6e1c2b7f6f0d3a1c0c06a5b0d93bd5d7d6f9b8d6b7e0c3f9f1d2a4b6c8e");
    assert_eq!(call["success"], true);
    assert_eq!(call["chainId"], 1281);
    assert_eq!(call["nonce"], 42);
    assert!(call["blockHash"].is_null());
    assert!(diag.is_empty(), "{:?}", diag.entries());
}

#[test]
fn frontier_call_args_decoded_with_abi() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", None);
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let processor = plugin.call_processor();
    let filter = processor.filter_validator(None).unwrap();
    let input: SubstrateCall = serde_json::from_value(load_fixture("frontier_transact_call.json")).unwrap();

    let calls = processor.transformer(&ctx, &filter, &input).unwrap();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.type_tag(), 2);
    assert_eq!(call.signature.v, Some(1));
    assert_eq!(call.selector(), Some("0x40c10f19"));

    let args = call.args.as_ref().unwrap();
    assert_eq!(args.get("amount_").and_then(NormalizedValue::as_u128), Some(1_000_000_000_000_000_000));
    assert_eq!(
        args.get("account_").and_then(NormalizedValue::as_address).map(str::to_lowercase),
        Some(MOONBEAM_SENDER.to_string())
    );
}

#[test]
fn frontier_call_filter_rejects_other_function() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", Some(MOONBEAM_TOKEN));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let processor = plugin.call_processor();
    let input: SubstrateCall = serde_json::from_value(load_fixture("frontier_transact_call.json")).unwrap();

    let transfer = processor.filter_validator(Some(&json!({"function": "transfer(address,uint256)"}))).unwrap();
    assert!(!processor.filter_processor(&ctx, &transfer, &input));

    let by_selector = processor.filter_validator(Some(&json!({"function": "0x40c10f19"}))).unwrap();
    assert!(processor.filter_processor(&ctx, &by_selector, &input));

    let wrong_sender = processor
        .filter_validator(Some(&json!({"from": "0x0000000000000000000000000000000000000001"})))
        .unwrap();
    assert!(!processor.filter_processor(&ctx, &wrong_sender, &input));
}

#[test]
fn frontier_call_without_outcome_never_matches() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", None);
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let mut raw = load_fixture("frontier_transact_call.json");
    raw["extrinsic"]["events"] = json!([]);
    let input: SubstrateCall = serde_json::from_value(raw).unwrap();

    let processor = plugin.call_processor();
    let filter = processor.filter_validator(None).unwrap();
    assert!(!processor.filter_processor(&ctx, &filter, &input));
    assert_eq!(diag.count(DiagnosticKind::FilterEvaluationFailed), 1);
}

#[test]
fn frontier_log_event_yields_one_record() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", Some(MOONBEAM_TOKEN));
    let assets = erc20_assets();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);

    let handler = plugin.handler("substrate/FrontierEvmEvent").unwrap();
    let filter = json!({"topics": [TRANSFER, "0x0000000000000000000000000000000000000000000000000000000000000000"]});
    let input = frontier_log_event();

    assert!(handler.filter(&ctx, Some(&filter), &input).unwrap());
    let logs = handler.transform(&ctx, Some(&filter), &input).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["logIndex"], 0);
    assert_eq!(logs[0]["transactionIndex"], 4);
    assert_eq!(logs[0]["from"], MOONBEAM_SENDER);
    assert_eq!(logs[0]["args"][2][0], "value");
}

#[test]
fn frontier_call_query_resolves_function() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", Some("0x220866B1A2219F40E72F5C628B65D54268CA3A9D"));
    let assets = AssetMap::new();
    let diag = CollectingDiagnostics::new();
    let ctx = HandlerContext::new(&ds, &assets, &diag);
    let handler = plugin.handler("substrate/FrontierEvmCall").unwrap();
    let query = handler
        .query(&ctx, Some(&json!({"function": "mint(address,uint256)"})))
        .unwrap()
        .unwrap();
    assert_eq!(query.entity, "evmTransactions");
    assert_eq!(query.value_of("to"), Some(MOONBEAM_TOKEN));
    assert_eq!(query.value_of("func"), Some("0x40c10f19"));
}

// ─── Registration ─────────────────────────────────────────────────────────────

#[test]
fn malformed_abi_fails_registration() {
    let plugin = frontier_plugin();
    let ds = datasource("substrate/FrontierEvm", None);
    let assets = AssetMap::from_pairs([("erc20", "{\"not\": \"an abi\"}")]);
    assert!(matches!(
        plugin.validate_datasource(&ds, &assets),
        Err(SieveError::InvalidAbi { .. })
    ));
}

#[test]
fn unknown_handler_kind_rejected() {
    let plugin = acala_plugin();
    let mut ds = datasource("substrate/AcalaEvm", None);
    ds.handlers.push(HandlerSpec {
        kind: "substrate/FrontierEvmEvent".into(),
        filter: None,
        handler: None,
    });
    assert!(matches!(
        plugin.validate_datasource(&ds, &erc20_assets()),
        Err(SieveError::UnknownKind { .. })
    ));
}

#[test]
fn wasm_option_rejected_for_evm() {
    let plugin = acala_plugin();
    let ds = Datasource::new(
        "substrate/AcalaEvm",
        DatasourceOptions {
            contract: Some("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".into()),
            ..Default::default()
        },
    );
    assert!(matches!(
        plugin.validate_datasource(&ds, &AssetMap::new()),
        Err(SieveError::InvalidOptions { .. })
    ));
}
