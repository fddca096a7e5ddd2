//! Error types for measurement probes.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for probe operations.
pub type ProbeResult<T> = Result<T, ProbeError>;

/// The step of a measurement cycle an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovery,
    Ping,
    Download,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Discovery => "discovery",
            Stage::Ping => "ping",
            Stage::Download => "download",
            Stage::Upload => "upload",
        })
    }
}

/// Errors that can occur during a measurement cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("discovery: no reachable target among {candidates} candidate(s)")]
    NoTarget { candidates: usize },

    #[error("{stage}: failed to connect to {address}: {source}")]
    Connect {
        stage: Stage,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage}: HTTP handshake with {address} failed: {source}")]
    Handshake {
        stage: Stage,
        address: String,
        #[source]
        source: hyper::Error,
    },

    #[error("{stage}: invalid request: {source}")]
    InvalidRequest {
        stage: Stage,
        #[source]
        source: http::Error,
    },

    #[error("{stage}: request to {path} failed: {source}")]
    Request {
        stage: Stage,
        path: String,
        #[source]
        source: hyper::Error,
    },

    #[error("{stage}: {path} returned {status}")]
    Status {
        stage: Stage,
        path: String,
        status: http::StatusCode,
    },

    #[error("{stage}: timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    #[error("{stage}: {message}")]
    Failed { stage: Stage, message: String },
}

impl ProbeError {
    /// A free-form failure attributed to a stage.
    pub fn failed(stage: Stage, message: impl Into<String>) -> Self {
        ProbeError::Failed {
            stage,
            message: message.into(),
        }
    }

    /// The cycle step this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            ProbeError::NoTarget { .. } => Stage::Discovery,
            ProbeError::Connect { stage, .. }
            | ProbeError::Handshake { stage, .. }
            | ProbeError::InvalidRequest { stage, .. }
            | ProbeError::Request { stage, .. }
            | ProbeError::Status { stage, .. }
            | ProbeError::Timeout { stage, .. }
            | ProbeError::Failed { stage, .. } => *stage,
        }
    }
}
