//! Analysis pipelines: weight normalization, per-kind request state,
//! result formatting and the orchestrator driving the scoring backend.

#[macro_use]
pub mod macros;
pub mod format;
pub mod orchestrator;
pub mod state;
pub mod weights;

use std::fmt::{Display, Formatter, Result as FmtResult};
use svc_siting_client_rest::service::ClientError;

/// The independent analysis pipelines
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    /// Score of the clicked point, followed by its reasoning
    Feasibility,

    /// Best locations nation wide
    Grid,

    /// Best locations around a center point
    Radius,

    /// Renewable supply around the pinpoint
    PowerSupply,
}

impl Display for AnalysisKind {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            AnalysisKind::Feasibility => write!(f, "feasibility"),
            AnalysisKind::Grid => write!(f, "grid"),
            AnalysisKind::Radius => write!(f, "radius"),
            AnalysisKind::PowerSupply => write!(f, "power supply"),
        }
    }
}

/// Problems detected before any request is sent
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Weights are negative, not finite, or sum to zero
    InvalidWeights,

    /// A radius search needs a selected center point
    MissingCenterPoint,

    /// A radius search was requested while radius mode is off
    RadiusModeInactive,

    /// Power supply analysis needs a pinpoint
    MissingPinpoint,

    /// Required capacity must be a positive number of megawatts
    InvalidCapacity(f64),

    /// Search radius must be a positive number of kilometers
    InvalidRadius(f64),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            ValidationError::InvalidWeights => {
                write!(f, "At least one weight must be greater than zero.")
            }
            ValidationError::MissingCenterPoint => {
                write!(f, "Select a center point on the map first.")
            }
            ValidationError::RadiusModeInactive => write!(f, "Radius mode is off."),
            ValidationError::MissingPinpoint => write!(f, "Select a location on the map first."),
            ValidationError::InvalidCapacity(mw) => {
                write!(f, "Required capacity must be positive, got {mw} MW.")
            }
            ValidationError::InvalidRadius(km) => {
                write!(f, "Search radius must be positive, got {km} km.")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Network or backend failure of one analysis call
#[derive(Debug, Clone, PartialEq)]
pub struct TransportError {
    /// Human readable cause
    pub message: String,

    /// Whether dispatching again may succeed
    pub retryable: bool,
}

impl TransportError {
    /// A call that did not complete within `timeout`
    pub fn timeout(kind: AnalysisKind, timeout: std::time::Duration) -> Self {
        Self {
            message: format!("{kind} request timed out after {} ms", timeout.as_millis()),
            retryable: true,
        }
    }
}

impl From<ClientError> for TransportError {
    fn from(e: ClientError) -> Self {
        Self {
            retryable: e.is_retryable(),
            message: e.to_string(),
        }
    }
}

impl Display for TransportError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransportError {}

/// Error returned by a dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Rejected before any network call
    Validation(ValidationError),

    /// The backend call failed
    Transport(TransportError),
}

impl From<ValidationError> for AnalysisError {
    fn from(e: ValidationError) -> Self {
        AnalysisError::Validation(e)
    }
}

impl From<TransportError> for AnalysisError {
    fn from(e: TransportError) -> Self {
        AnalysisError::Transport(e)
    }
}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            AnalysisError::Validation(e) => write!(f, "Validation error: {e}"),
            AnalysisError::Transport(e) => write!(f, "Transport error: {e}"),
        }
    }
}

impl std::error::Error for AnalysisError {}
