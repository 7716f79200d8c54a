//! Ethermint adapter: EVM transactions carried by Cosmos SDK chains.
//!
//! ## Logs
//! Every EVM log of a transaction is a `txLog` attribute on the ABCI event,
//! holding a JSON object `{address, topics, data, blockNumber, txHash,
//! txIndex, blockHash, index, removed}` with `data` base64-encoded. One
//! event therefore yields any number of logs.
//!
//! ## Calls
//! Calls are `MsgEthereumTx` messages. The inner transaction data is
//! unpacked through the injected `TxDataRegistry`; the envelope follows its
//! type URL (`DynamicFeeTx`, `AccessListTx`, otherwise legacy).

use std::sync::Arc;

use alloy_primitives::U256;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;

use chainsieve_core::adapter::{ChainAdapter, ExecutionOutcome, Flavor};
use chainsieve_core::cache::SingleSlot;
use chainsieve_core::call::{NormalizedCall, TxEnvelope, TxSignature};
use chainsieve_core::diagnostics::Diagnostics;
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{decode_hex, encode_hex, is_hex_string, HASH_ZERO};
use chainsieve_core::log::{LogEnvelope, RawLog};
use chainsieve_core::raw::value::{field, to_i64, to_str, to_u256, to_u64};
use chainsieve_evm::ethjson::parse_access_list;
use chainsieve_evm::processor::EvmAdapter;

use crate::raw::{CosmosEvent, CosmosMessage, CosmosTx};
use crate::txdata::{TxData, TxDataKind, TxDataRegistry};

const TX_LOG_KEY: &str = "txLog";
const ETHEREUM_TX_EVENT: &str = "ethereumTx";
const TX_FAILED_KEY: &str = "ethereumTxFailed";

// ─── Encoding helpers ─────────────────────────────────────────────────────────

pub(crate) fn decode_base64(s: &str, what: &str) -> Result<Vec<u8>, SieveError> {
    STANDARD
        .decode(s.trim())
        .map_err(|e| SieveError::raw_input(format!("{what}: invalid base64: {e}")))
}

/// Proto3 JSON bytes (base64) as 0x-hex. Hex input is accepted unchanged
/// since some clients pre-convert.
fn bytes_to_hex(s: &str, what: &str) -> Result<String, SieveError> {
    if is_hex_string(s) {
        return Ok(s.to_lowercase());
    }
    decode_base64(s, what).map(|b| encode_hex(&b))
}

fn body_str<'a>(body: &'a Value, names: &[&str], what: &str) -> Result<Option<&'a str>, SieveError> {
    field(body, names).map(|v| to_str(v, what)).transpose()
}

fn body_u256(body: &Value, names: &[&str], what: &str) -> Result<U256, SieveError> {
    to_u256(field(body, names).unwrap_or(&Value::Null), what)
}

/// Signature component as hex, or `None` when absent or empty.
fn body_sig(body: &Value, name: &str) -> Result<Option<String>, SieveError> {
    match body_str(body, &[name], name)? {
        Some(s) if !s.is_empty() => bytes_to_hex(s, name).map(Some),
        _ => Ok(None),
    }
}

// ─── Success ──────────────────────────────────────────────────────────────────

/// Whether message `msg_index` of `tx` executed successfully.
///
/// Older SDKs report per-message logs in the raw log; a message failed when
/// its `ethereumTx` event carries an `ethereumTxFailed` attribute. Newer
/// SDKs leave the raw log empty, in which case the result code decides. A
/// raw log that is not a JSON log list means failure.
pub fn tx_success(tx: &CosmosTx, msg_index: u32) -> bool {
    let raw = tx.log.as_deref().map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return tx.code == 0;
    }

    let Ok(Value::Array(logs)) = serde_json::from_str::<Value>(raw) else {
        return false;
    };

    // msg_index is omitted for the first message
    let msg_log = logs.iter().find(|l| {
        l.get("msg_index").and_then(Value::as_u64).unwrap_or(0) == u64::from(msg_index)
    });
    let Some(msg_log) = msg_log else {
        return true;
    };

    let failed = msg_log
        .get("events")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|e| e.get("type").and_then(Value::as_str) == Some(ETHEREUM_TX_EVENT))
        .flat_map(|e| e.get("attributes").and_then(Value::as_array).into_iter().flatten())
        .any(|a| a.get("key").and_then(Value::as_str) == Some(TX_FAILED_KEY));
    !failed
}

// ─── Logs ─────────────────────────────────────────────────────────────────────

/// One `txLog` attribute value.
pub fn parse_tx_log(raw: &str) -> Result<RawLog, SieveError> {
    let v: Value =
        serde_json::from_str(raw).map_err(|e| SieveError::raw_input(format!("txLog: invalid JSON: {e}")))?;

    let address = to_str(
        field(&v, &["address"]).ok_or_else(|| SieveError::raw_input("txLog: missing address"))?,
        "txLog.address",
    )?;
    let topics = field(&v, &["topics"])
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|t| to_str(t, "txLog.topics").map(str::to_string))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();
    let data = match body_str(&v, &["data"], "txLog.data")? {
        Some(d) if !d.is_empty() => bytes_to_hex(d, "txLog.data")?,
        _ => HASH_ZERO.to_string(),
    };

    let mut log = RawLog::new(address, topics, data);
    log.log_index = field(&v, &["index", "logIndex"]).map(|i| to_i64(i, "txLog.index")).transpose()?;
    log.transaction_hash = body_str(&v, &["txHash", "transactionHash"], "txLog.txHash")?.map(str::to_string);
    log.transaction_index = field(&v, &["txIndex", "transactionIndex"])
        .map(|i| to_i64(i, "txLog.txIndex"))
        .transpose()?;
    Ok(log)
}

// ─── Adapter ──────────────────────────────────────────────────────────────────

pub struct EthermintAdapter {
    registry: Arc<dyn TxDataRegistry>,
    /// Most recently unpacked message, shared by filter and transform.
    last_decoded: SingleSlot<(String, u32), TxData>,
}

impl EthermintAdapter {
    pub fn new(registry: Arc<dyn TxDataRegistry>) -> Self {
        Self {
            registry,
            last_decoded: SingleSlot::new(),
        }
    }

    fn tx_data(&self, input: &CosmosMessage) -> Result<Arc<TxData>, SieveError> {
        let key = (input.msg.hash.clone(), input.idx);
        let mut failure = None;
        let decoded = self.last_decoded.get_or_insert_with(&key, || {
            self.registry
                .decode(&input.msg.data)
                .map_err(|e| failure = Some(e))
                .ok()
        });
        decoded.ok_or_else(|| {
            failure.unwrap_or_else(|| {
                SieveError::raw_input(format!("transaction data of {} could not be decoded", input.msg.hash))
            })
        })
    }

    fn target(body: &Value) -> Result<Option<String>, SieveError> {
        Ok(body_str(body, &["to"], "to")?
            .filter(|to| !to.is_empty())
            .map(str::to_string))
    }
}

impl std::fmt::Debug for EthermintAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EthermintAdapter").finish_non_exhaustive()
    }
}

impl ChainAdapter for EthermintAdapter {
    type EventInput = CosmosEvent;
    type CallInput = CosmosMessage;
    type Candidate = RawLog;
    type Call = NormalizedCall;

    fn flavor(&self) -> Flavor {
        Flavor::EthermintEvm
    }

    fn extract_outcome(&self, input: &CosmosMessage) -> Result<ExecutionOutcome, SieveError> {
        let data = self.tx_data(input)?;
        Ok(ExecutionOutcome {
            from: input.msg.from.clone(),
            to: Self::target(&Value::Object(data.body.clone()))?,
            hash: Some(input.msg.hash.clone()),
            success: tx_success(&input.tx, input.idx),
        })
    }

    fn extract_logs(&self, input: &CosmosEvent) -> Result<Vec<RawLog>, SieveError> {
        let logs = input
            .event
            .values(TX_LOG_KEY)
            .map(parse_tx_log)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::trace!(event = %input.event.kind, logs = logs.len(), "unpacked txLog attributes");
        Ok(logs)
    }

    fn extract_call(&self, input: &CosmosMessage, _diagnostics: &dyn Diagnostics) -> Result<NormalizedCall, SieveError> {
        let data = self.tx_data(input)?;
        let body = Value::Object(data.body.clone());

        let nonce = to_u64(field(&body, &["nonce"]).unwrap_or(&Value::Null), "nonce")?;
        let gas_limit = body_u256(&body, &["gas", "gasLimit"], "gas")?;
        let value = body_u256(&body, &["value", "amount"], "value")?;
        let input_data = match body_str(&body, &["data", "input"], "data")? {
            Some(d) if !d.is_empty() => bytes_to_hex(d, "data")?,
            _ => "0x".to_string(),
        };
        let chain_id = match (data.kind, field(&body, &["chainId", "chain_id"])) {
            (TxDataKind::Legacy, _) | (_, None) => -1,
            (_, Some(id)) => to_i64(id, "chainId")?,
        };
        let accesses = field(&body, &["accesses", "accessList"]);

        let (envelope, signature) = match data.kind {
            TxDataKind::DynamicFee => (
                TxEnvelope::Eip1559 {
                    max_fee_per_gas: body_u256(&body, &["gasFeeCap", "gas_fee_cap"], "gasFeeCap")?,
                    max_priority_fee_per_gas: body_u256(&body, &["gasTipCap", "gas_tip_cap"], "gasTipCap")?,
                    access_list: parse_access_list(accesses)?,
                },
                TxSignature {
                    r: body_sig(&body, "r")?,
                    s: body_sig(&body, "s")?,
                    v: None,
                },
            ),
            TxDataKind::AccessList => (
                TxEnvelope::Eip2930 {
                    gas_price: body_u256(&body, &["gasPrice", "gas_price"], "gasPrice")?,
                    access_list: parse_access_list(accesses)?,
                },
                TxSignature {
                    r: body_sig(&body, "r")?,
                    s: body_sig(&body, "s")?,
                    v: None,
                },
            ),
            TxDataKind::Legacy => (
                TxEnvelope::Legacy {
                    gas_price: body_u256(&body, &["gasPrice", "gas_price"], "gasPrice")?,
                },
                TxSignature {
                    r: body_sig(&body, "r")?,
                    s: body_sig(&body, "s")?,
                    v: body_sig(&body, "v")?
                        .map(|hex| decode_hex(&hex))
                        .transpose()?
                        .map(|bytes| bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))),
                },
            ),
        };

        Ok(NormalizedCall {
            from: input.msg.from.clone(),
            to: Self::target(&body)?,
            nonce,
            data: input_data,
            value,
            hash: input.msg.hash.clone(),
            block_number: input.block.height,
            block_hash: Some(input.block.id.clone()),
            timestamp: input.block.time.timestamp(),
            success: tx_success(&input.tx, input.idx),
            chain_id,
            gas_limit,
            envelope,
            signature,
            args: None,
        })
    }
}

impl EvmAdapter for EthermintAdapter {
    fn log_envelope(&self, input: &CosmosEvent, _diagnostics: &dyn Diagnostics) -> LogEnvelope {
        LogEnvelope {
            block_number: input.block.height,
            block_hash: Some(input.block.id.clone()),
            block_timestamp: input.block.time,
            transaction_hash: Some(input.tx.hash.clone()),
            transaction_index: -1,
            from: None,
            log_index: None,
        }
    }

    fn packs_logs(&self) -> bool {
        true
    }
}
