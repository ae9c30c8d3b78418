//! Error types for dasein-tests
//!
//! There are two error types: `DaseinError` (main error enum) and
//! `ConfigError` (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `DaseinError`.
//! The binary uses `anyhow::Result<T>` for top-level error handling, and the
//! conversion happens at the CLI boundary.
//!
//! ## Propagation Policy
//!
//! The harness runs the same suites against many providers that legitimately
//! lack features, so only two families are allowed to fail a test:
//!
//! - `Provisioning`: a required resource could not be created
//! - `Timeout`: a polled state transition missed its wall-clock budget
//! - `TerminalState`: a polled resource settled in a state it won't leave
//!
//! `Unsupported` and `NotSubscribed` are reported as skips (see
//! [`DaseinError::is_skip`]). Teardown errors are never propagated at all;
//! the coordinator logs them and moves on.

use crate::provider::{ResourceId, ResourceKind};
use std::time::Duration;
use thiserror::Error;

/// Main error type for dasein-tests
#[derive(Error, Debug)]
pub enum DaseinError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cloud provider error: {provider} - {message}")]
    CloudProvider {
        provider: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{kind} is not supported by this provider")]
    Unsupported { kind: ResourceKind },

    #[error("Account is not subscribed to {kind}")]
    NotSubscribed { kind: ResourceKind },

    #[error("Resource not found: {kind} - {id}")]
    ResourceNotFound { kind: ResourceKind, id: ResourceId },

    #[error("Failed to provision {kind} for label '{label}': {message}")]
    Provisioning {
        kind: ResourceKind,
        label: String,
        message: String,
    },

    #[error("Timed out after {waited:?} ({attempts} checks) waiting for {what}, last state: {last_state}")]
    Timeout {
        what: String,
        waited: Duration,
        attempts: u32,
        last_state: String,
    },

    #[error("Gave up waiting for {what} after {attempts} checks: reached terminal state {state}")]
    TerminalState {
        what: String,
        attempts: u32,
        state: String,
    },

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown cloud provider: {0}")]
    InvalidProvider(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DaseinError>;

impl DaseinError {
    /// Shorthand for a provider-side failure without an underlying source
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        DaseinError::CloudProvider {
            provider: provider.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Whether this error means "the feature isn't there" rather than "something broke"
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            DaseinError::Unsupported { .. } | DaseinError::NotSubscribed { .. }
        )
    }

    /// Whether the resource was already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, DaseinError::ResourceNotFound { .. })
    }
}

/// Fail with an assertion error unless `cond` holds.
///
/// Suites use this instead of `assert!` so a failing check becomes a reported
/// test failure instead of a panic in the runner.
pub fn ensure(cond: bool, message: impl Into<String>) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(DaseinError::Assertion(message.into()))
    }
}
