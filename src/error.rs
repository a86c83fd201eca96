//! Error types for Stepflow.
//!
//! All errors in Stepflow are represented by the `StepflowError` enum.
//! None of the context operations swallow errors or retry on their own;
//! the caller (usually the external scheduler) decides what to do.

use std::{io::ErrorKind, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Stepflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum StepflowError {
    /// `get` on a key that is not in the shared store and no default was given.
    #[error("key '{0}' not found in context")]
    KeyNotFound(String),

    /// Targeted send to a step the workflow does not define.
    #[error("step {0} does not exist")]
    UnknownStep(String),

    /// Targeted send of an event type the step does not accept.
    #[error("step {step} does not accept event of type {event_type}")]
    EventNotAccepted {
        step: String,
        event_type: String,
    },

    /// No matching event reached the waiter queue in time.
    #[error("timed out after {elapsed:?} waiting for event of type {event_type}")]
    WaitTimeout {
        event_type: String,
        elapsed: Duration,
    },

    /// The event codec failed for a specific snapshot entry.
    #[error("failed to (de)serialize value for key {key}: {message}")]
    Serialization {
        key: String,
        message: String,
    },

    /// The run was cancelled while an operation was suspended.
    #[error("run cancelled")]
    Cancelled,

    /// Configuration parsing or validation errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, base64, typed values).
    #[error("{0}")]
    Convert(String),

    /// Runtime bookkeeping errors.
    #[error("{0}")]
    Runtime(String),

    /// Message queue errors.
    #[error("{0}")]
    Queue(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),
}

impl StepflowError {
    /// Wraps a codec failure with the snapshot entry it happened on.
    pub(crate) fn serialization(
        key: impl Into<String>,
        error: StepflowError,
    ) -> Self {
        StepflowError::Serialization {
            key: key.into(),
            message: error.to_string(),
        }
    }
}

impl From<StepflowError> for String {
    fn from(val: StepflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for StepflowError {
    fn from(error: std::io::Error) -> Self {
        StepflowError::IoError(error.to_string())
    }
}

impl From<StepflowError> for std::io::Error {
    fn from(val: StepflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<serde_json::Error> for StepflowError {
    fn from(error: serde_json::Error) -> Self {
        StepflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for StepflowError {
    fn from(error: toml::de::Error) -> Self {
        StepflowError::Config(error.to_string())
    }
}

impl From<base64::DecodeError> for StepflowError {
    fn from(error: base64::DecodeError) -> Self {
        StepflowError::Convert(error.to_string())
    }
}
