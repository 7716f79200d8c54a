//! Acala EVM+ adapter.
//!
//! Acala packs every log of a transaction into its execution outcome event
//! (`evm.Executed`, `evm.ExecutedFailed`, `evm.Created`, `evm.CreatedFailed`),
//! so one event can yield any number of logs. Calls are `evm.ethCall`
//! extrinsics whose arguments start with `[action, input, value, gas_limit]`.

use alloy_primitives::U256;
use serde_json::Value;

use chainsieve_core::adapter::{ChainAdapter, ExecutionOutcome, Flavor};
use chainsieve_core::call::{NormalizedCall, TxEnvelope, TxSignature};
use chainsieve_core::diagnostics::{DiagnosticKind, Diagnostics};
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{DUMMY_TX_HASH, EMPTY_ADDRESS};
use chainsieve_core::log::{LogEnvelope, RawLog};
use chainsieve_core::raw::value::{arg, is_empty_account, to_str, to_u256};
use chainsieve_core::raw::{EventRecord, SubstrateCall, SubstrateEvent, SubstrateExtrinsic};

use crate::ethjson::{parse_action, parse_log, TxAction};
use crate::processor::EvmAdapter;

const OUTCOME_EVENTS: [(&str, &str); 4] = [
    ("evm", "Executed"),
    ("evm", "ExecutedFailed"),
    ("evm", "Created"),
    ("evm", "CreatedFailed"),
];

/// Position of the packed log list in an outcome event's data.
fn packed_logs_slot(event: &EventRecord) -> Option<usize> {
    if event.section != "evm" {
        return None;
    }
    match event.method.as_str() {
        "Executed" | "Created" => Some(2),
        "CreatedFailed" => Some(3),
        "ExecutedFailed" => Some(4),
        _ => None,
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct AcalaAdapter;

impl AcalaAdapter {
    pub fn new() -> Self {
        Self
    }

    fn outcome_of(&self, extrinsic: &SubstrateExtrinsic) -> Result<ExecutionOutcome, SieveError> {
        let event = extrinsic
            .find_event(&OUTCOME_EVENTS)
            .ok_or_else(|| SieveError::ExecutionEventMissing {
                extrinsic: extrinsic.hash.clone(),
            })?;

        let from = to_str(arg(&event.data, 0, "evm outcome")?, "evm outcome from")?;
        let to = match event.data.get(1) {
            Some(Value::String(to)) if !is_empty_account(Some(to)) => Some(to.clone()),
            _ => None,
        };

        Ok(ExecutionOutcome {
            from: from.to_string(),
            to,
            hash: Some(extrinsic.hash.clone()),
            success: event.is("evm", "Executed"),
        })
    }
}

impl ChainAdapter for AcalaAdapter {
    type EventInput = SubstrateEvent;
    type CallInput = SubstrateCall;
    type Candidate = RawLog;
    type Call = NormalizedCall;

    fn flavor(&self) -> Flavor {
        Flavor::AcalaEvm
    }

    fn extract_outcome(&self, input: &SubstrateCall) -> Result<ExecutionOutcome, SieveError> {
        self.outcome_of(&input.extrinsic)
    }

    fn extract_logs(&self, input: &SubstrateEvent) -> Result<Vec<RawLog>, SieveError> {
        let Some(slot) = packed_logs_slot(&input.event) else {
            return Ok(Vec::new());
        };
        match input.event.data.get(slot) {
            Some(Value::Array(logs)) => logs.iter().map(parse_log).collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(SieveError::raw_input(format!(
                "{}.{} logs: expected an array, got {other}",
                input.event.section, input.event.method
            ))),
        }
    }

    fn extract_call(&self, input: &SubstrateCall, diagnostics: &dyn Diagnostics) -> Result<NormalizedCall, SieveError> {
        let args = &input.extrinsic.args;
        let action = parse_action(arg(args, 0, "evm.ethCall")?)?;
        let data = to_str(arg(args, 1, "evm.ethCall")?, "input")?.to_string();
        let value = to_u256(args.get(2).unwrap_or(&Value::Null), "value")?;
        let gas_limit = to_u256(args.get(3).unwrap_or(&Value::Null), "gasLimit")?;

        let outcome = match self.extract_outcome(input) {
            Ok(outcome) => Some(outcome),
            Err(e @ SieveError::ExecutionEventMissing { .. }) => {
                diagnostics.emit(
                    DiagnosticKind::ExecutionEventMissing,
                    &format!("{e} at {}, call marked as failed", input.position()),
                );
                None
            }
            Err(e) => return Err(e),
        };

        let to = match action {
            TxAction::Create => None,
            TxAction::Call(target) => outcome.as_ref().and_then(|o| o.to.clone()).or(Some(target)),
        };

        Ok(NormalizedCall {
            from: outcome
                .as_ref()
                .map_or_else(|| EMPTY_ADDRESS.to_string(), |o| o.from.clone()),
            to,
            nonce: input.extrinsic.nonce,
            data,
            value,
            hash: input.extrinsic.hash.clone(),
            block_number: input.block.number,
            block_hash: Some(input.block.hash.clone()),
            timestamp: input.block.timestamp.timestamp(),
            success: input.extrinsic.has_event("evm", "Executed"),
            chain_id: -1,
            gas_limit,
            envelope: TxEnvelope::Legacy { gas_price: U256::ZERO },
            signature: TxSignature::default(),
            args: None,
        })
    }
}

impl EvmAdapter for AcalaAdapter {
    fn log_envelope(&self, input: &SubstrateEvent, diagnostics: &dyn Diagnostics) -> LogEnvelope {
        let from = match &input.extrinsic {
            None => Some(EMPTY_ADDRESS.to_string()),
            Some(extrinsic) => match self.outcome_of(extrinsic) {
                Ok(outcome) => Some(outcome.from),
                Err(e) => {
                    diagnostics.emit(DiagnosticKind::ExecutionEventMissing, &e.to_string());
                    None
                }
            },
        };

        LogEnvelope {
            block_number: input.block.number,
            block_hash: Some(input.block.hash.clone()),
            block_timestamp: input.block.timestamp,
            transaction_hash: Some(
                input
                    .extrinsic
                    .as_ref()
                    .map_or_else(|| DUMMY_TX_HASH.to_string(), |x| x.hash.clone()),
            ),
            transaction_index: input.extrinsic.as_ref().map_or(-1, |x| i64::from(x.idx)),
            from,
            log_index: None,
        }
    }

    fn packs_logs(&self) -> bool {
        true
    }
}
