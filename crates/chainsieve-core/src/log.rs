//! Canonical EVM log record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SieveError;
use crate::types::DecodedArgs;

/// Ethereum logs carry at most four topics.
pub const MAX_TOPICS: usize = 4;

/// A log as extracted from a flavor's raw event, before filtering.
///
/// The optional position fields are filled only when the source encoding
/// carries them (Ethermint `txLog` JSON does, Acala packed logs do not).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    pub topics: Vec<String>,
    /// 0x-prefixed hex
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_index: Option<i64>,
}

impl RawLog {
    pub fn new(address: impl Into<String>, topics: Vec<String>, data: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            topics,
            data: data.into(),
            log_index: None,
            transaction_hash: None,
            transaction_index: None,
        }
    }

    /// A log with more than `MAX_TOPICS` topics is malformed.
    pub fn check_topics(&self) -> Result<(), SieveError> {
        if self.topics.len() > MAX_TOPICS {
            return Err(SieveError::raw_input(format!(
                "log of {} has {} topics, at most {MAX_TOPICS} allowed",
                self.address,
                self.topics.len()
            )));
        }
        Ok(())
    }
}

/// Block and transaction context shared by every log of one source event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEnvelope {
    pub block_number: u64,
    pub block_hash: Option<String>,
    pub block_timestamp: DateTime<Utc>,
    pub transaction_hash: Option<String>,
    pub transaction_index: i64,
    pub from: Option<String>,
    /// Set when the source event itself fixes the log position.
    pub log_index: Option<i64>,
}

/// A decoded event occurrence in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    pub block_number: u64,
    pub block_hash: Option<String>,
    pub transaction_hash: Option<String>,
    pub transaction_index: i64,
    pub log_index: i64,
    pub block_timestamp: DateTime<Utc>,
    pub from: Option<String>,
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<DecodedArgs>,
}

impl NormalizedLog {
    /// Combine an extracted log with its envelope. `position` is the index of
    /// the log among the matches of its source event, used when neither the
    /// log nor the envelope fixes a log index.
    pub fn assemble(raw: RawLog, envelope: &LogEnvelope, position: usize) -> Result<Self, SieveError> {
        raw.check_topics()?;

        Ok(Self {
            address: raw.address,
            topics: raw.topics,
            data: raw.data,
            block_number: envelope.block_number,
            block_hash: envelope.block_hash.clone(),
            transaction_hash: raw.transaction_hash.or_else(|| envelope.transaction_hash.clone()),
            transaction_index: raw.transaction_index.unwrap_or(envelope.transaction_index),
            log_index: raw
                .log_index
                .or(envelope.log_index)
                .unwrap_or(position as i64),
            block_timestamp: envelope.block_timestamp,
            from: envelope.from.clone(),
            removed: false,
            args: None,
        })
    }

    /// The extracted view of this log, as seen by the filter engine.
    pub fn raw(&self) -> RawLog {
        RawLog {
            address: self.address.clone(),
            topics: self.topics.clone(),
            data: self.data.clone(),
            log_index: Some(self.log_index),
            transaction_hash: self.transaction_hash.clone(),
            transaction_index: Some(self.transaction_index),
        }
    }
}
