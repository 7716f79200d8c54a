//! Frontier adapter, shared by the Frontier and Moonbeam datasource kinds.
//!
//! Each `evm.Log` event carries exactly one log. Calls are
//! `ethereum.transact` extrinsics with the signed transaction as the only
//! argument; sender, target, hash and status come from the sibling
//! `ethereum.Executed` event `[from, to, hash, exit_reason]`.

use serde_json::Value;

use chainsieve_core::adapter::{ChainAdapter, ExecutionOutcome, Flavor};
use chainsieve_core::call::NormalizedCall;
use chainsieve_core::diagnostics::{DiagnosticKind, Diagnostics};
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::EMPTY_ADDRESS;
use chainsieve_core::log::{LogEnvelope, RawLog};
use chainsieve_core::raw::value::{arg, is_empty_account, to_str};
use chainsieve_core::raw::{SubstrateCall, SubstrateEvent, SubstrateExtrinsic};

use crate::ethjson::{parse_eth_transaction, parse_log, TxAction};
use crate::processor::EvmAdapter;

/// `true` when an `ExitReason` is the `Succeed` variant.
fn exit_succeeded(reason: &Value) -> bool {
    match reason {
        Value::Object(obj) => obj.keys().any(|k| k.eq_ignore_ascii_case("succeed")),
        Value::String(s) => s.eq_ignore_ascii_case("succeed"),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrontierAdapter {
    flavor: Flavor,
}

impl FrontierAdapter {
    pub fn frontier() -> Self {
        Self {
            flavor: Flavor::FrontierEvm,
        }
    }

    pub fn moonbeam() -> Self {
        Self {
            flavor: Flavor::MoonbeamEvm,
        }
    }

    fn outcome_of(&self, extrinsic: &SubstrateExtrinsic) -> Result<ExecutionOutcome, SieveError> {
        let event = extrinsic
            .find_event(&[("ethereum", "Executed")])
            .ok_or_else(|| SieveError::ExecutionEventMissing {
                extrinsic: extrinsic.hash.clone(),
            })?;

        let from = to_str(arg(&event.data, 0, "ethereum.Executed")?, "from")?;
        let to = match event.data.get(1) {
            Some(Value::String(to)) if !is_empty_account(Some(to)) => Some(to.clone()),
            _ => None,
        };
        let hash = to_str(arg(&event.data, 2, "ethereum.Executed")?, "transaction hash")?;
        let reason = arg(&event.data, 3, "ethereum.Executed")?;

        Ok(ExecutionOutcome {
            from: from.to_string(),
            to,
            hash: Some(hash.to_string()),
            success: exit_succeeded(reason),
        })
    }
}

impl Default for FrontierAdapter {
    fn default() -> Self {
        Self::frontier()
    }
}

impl ChainAdapter for FrontierAdapter {
    type EventInput = SubstrateEvent;
    type CallInput = SubstrateCall;
    type Candidate = RawLog;
    type Call = NormalizedCall;

    fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn extract_outcome(&self, input: &SubstrateCall) -> Result<ExecutionOutcome, SieveError> {
        self.outcome_of(&input.extrinsic)
    }

    fn extract_logs(&self, input: &SubstrateEvent) -> Result<Vec<RawLog>, SieveError> {
        if !input.event.is("evm", "Log") {
            return Ok(Vec::new());
        }
        let log = arg(&input.event.data, 0, "evm.Log")?;
        Ok(vec![parse_log(log)?])
    }

    fn extract_call(&self, input: &SubstrateCall, diagnostics: &dyn Diagnostics) -> Result<NormalizedCall, SieveError> {
        let tx = parse_eth_transaction(arg(&input.extrinsic.args, 0, "ethereum.transact")?)?;

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

        let to = match tx.action {
            TxAction::Create => None,
            TxAction::Call(target) => outcome.as_ref().and_then(|o| o.to.clone()).or(Some(target)),
        };

        Ok(NormalizedCall {
            from: outcome
                .as_ref()
                .map_or_else(|| EMPTY_ADDRESS.to_string(), |o| o.from.clone()),
            to,
            nonce: tx.nonce,
            data: tx.input,
            value: tx.value,
            hash: outcome
                .as_ref()
                .and_then(|o| o.hash.clone())
                .unwrap_or_else(|| input.extrinsic.hash.clone()),
            block_number: input.block.number,
            block_hash: None,
            timestamp: input.block.timestamp.timestamp(),
            success: outcome.as_ref().map_or(false, |o| o.success),
            chain_id: tx.chain_id,
            gas_limit: tx.gas_limit,
            envelope: tx.envelope,
            signature: tx.signature,
            args: None,
        })
    }
}

impl EvmAdapter for FrontierAdapter {
    fn log_envelope(&self, input: &SubstrateEvent, diagnostics: &dyn Diagnostics) -> LogEnvelope {
        let outcome = input.extrinsic.as_ref().and_then(|x| match self.outcome_of(x) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                diagnostics.emit(DiagnosticKind::ExecutionEventMissing, &e.to_string());
                None
            }
        });

        // Position among the extrinsic's evm.Log events, -1 outside one
        let log_index = input
            .extrinsic
            .as_ref()
            .and_then(|x| {
                x.events
                    .iter()
                    .filter(|e| e.is("evm", "Log"))
                    .position(|e| e.idx == input.event.idx)
            })
            .map_or(-1, |i| i as i64);

        LogEnvelope {
            block_number: input.block.number,
            block_hash: None,
            block_timestamp: input.block.timestamp,
            transaction_hash: outcome.as_ref().and_then(|o| o.hash.clone()),
            transaction_index: input.extrinsic.as_ref().map_or(-1, |x| i64::from(x.idx)),
            from: outcome.map(|o| o.from),
            log_index: Some(log_index),
        }
    }
}
