//! Error taxonomy shared by every driver.
//!
//! Native driver failures are captured where they happen (code + message)
//! and wrapped into one of these variants. No backend-specific error type
//! leaks through the public API.

use thiserror::Error;

use crate::resultset::StatsResult;
use crate::value::ValueKind;

/// Errors produced by the abstraction core and by driver adapters.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to connect to '{url}': {message}")]
    Connection { url: String, message: String },

    #[error("Failed to prepare statement: {message}")]
    Prepare { message: String },

    #[error("Failed to bind parameter {parameter}: {message}")]
    Bind { parameter: String, message: String },

    #[error("Execution failed [{code}]: {message}")]
    Execution { code: String, message: String },

    #[error("Cannot convert {from} value to {to}: {message}")]
    Conversion {
        from: ValueKind,
        to: ValueKind,
        message: String,
    },

    #[error("Index {index} out of range (size {len})")]
    Index { index: usize, len: usize },

    #[error("No driver found for scheme '{scheme}'")]
    DriverNotFound { scheme: String },

    #[error("Operation '{operation}' is not supported by the {driver} driver")]
    Unsupported {
        driver: &'static str,
        operation: &'static str,
    },

    #[error("Invalid iterator")]
    InvalidIterator,

    #[error("Cursor is busy: a row borrowed from it is still alive")]
    CursorBusy,

    #[error("Invalid connection URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{source} (batch stopped after {} affected rows)", .completed.affected_rows)]
    Batch {
        completed: StatsResult,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn conversion(from: ValueKind, to: ValueKind, message: impl Into<String>) -> Self {
        Error::Conversion {
            from,
            to,
            message: message.into(),
        }
    }

    pub(crate) fn bind(parameter: impl ToString, message: impl Into<String>) -> Self {
        Error::Bind {
            parameter: parameter.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn execution(code: impl ToString, message: impl Into<String>) -> Self {
        Error::Execution {
            code: code.to_string(),
            message: message.into(),
        }
    }

    /// Failure of a multi-statement call after `completed` work. Without
    /// completed work the native error is returned as is.
    pub(crate) fn batch(completed: StatsResult, source: Error) -> Self {
        if completed == StatsResult::default() {
            source
        } else {
            Error::Batch {
                completed,
                source: Box::new(source),
            }
        }
    }

    /// Accounting of the statements that completed before a batch failed.
    ///
    /// Returns `None` for every error other than [`Error::Batch`].
    pub fn completed(&self) -> Option<&StatsResult> {
        match self {
            Error::Batch { completed, .. } => Some(completed),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
