//! Error types for the ChainSieve filter and transform pipeline.
//!
//! Registration-time variants (`InvalidAbi`, `InvalidFilterSpec`,
//! `AbiNotReferenced`, `InvalidOptions`) abort datasource activation.
//! Per-record variants are caught at the processor boundary and degrade a
//! single record instead of the whole scan.

use std::fmt;
use thiserror::Error;

/// A single field-level complaint produced while validating a filter or
/// datasource options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterViolation {
    pub field: String,
    pub reason: String,
}

impl FilterViolation {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FilterViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

fn join_violations(violations: &[FilterViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised anywhere in the ChainSieve pipeline.
#[derive(Debug, Error)]
pub enum SieveError {
    #[error("ABI '{name}' is invalid: {reason}")]
    InvalidAbi { name: String, reason: String },

    #[error("Invalid {kind} filter: {}", join_violations(.violations))]
    InvalidFilterSpec {
        kind: String,
        violations: Vec<FilterViolation>,
    },

    #[error("Invalid topic filter '{token}': {reason}")]
    InvalidTopicFilter { token: String, reason: String },

    #[error("Invalid selector token '{token}': {reason}")]
    InvalidSelectorToken { token: String, reason: String },

    #[error("Execution event missing for extrinsic {extrinsic}")]
    ExecutionEventMissing { extrinsic: String },

    #[error("Argument decode failed: {reason}")]
    ArgDecodeFailed { reason: String },

    #[error("ABI named \"{name}\" not referenced in assets")]
    AbiNotReferenced { name: String },

    #[error("Invalid datasource options: {}", join_violations(.violations))]
    InvalidOptions { violations: Vec<FilterViolation> },

    #[error("Unknown {what} kind '{kind}'")]
    UnknownKind { what: &'static str, kind: String },

    #[error("Invalid raw input: {reason}")]
    InvalidRawInput { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl SieveError {
    /// Shorthand for the most common per-record failure.
    pub fn raw_input(reason: impl Into<String>) -> Self {
        SieveError::InvalidRawInput {
            reason: reason.into(),
        }
    }

    /// `true` for errors that must abort datasource registration.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            SieveError::InvalidAbi { .. }
                | SieveError::InvalidFilterSpec { .. }
                | SieveError::AbiNotReferenced { .. }
                | SieveError::InvalidOptions { .. }
                | SieveError::UnknownKind { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_spec_lists_every_violation() {
        let err = SieveError::InvalidFilterSpec {
            kind: "event".into(),
            violations: vec![
                FilterViolation::new("topics[0]", "not a hex string or event signature"),
                FilterViolation::new("extra", "unknown field"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("topics[0]"));
        assert!(msg.contains("extra: unknown field"));
        assert!(err.is_registration_error());
    }

    #[test]
    fn per_record_errors_are_not_fatal() {
        let err = SieveError::ExecutionEventMissing {
            extrinsic: "12-3".into(),
        };
        assert!(!err.is_registration_error());
    }
}
