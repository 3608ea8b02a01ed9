//! Client Library: the scoring backend operations

use crate::types::*;
use async_trait::async_trait;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Errors returned by any [`ScoringService`] call
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The request never produced a response (connection refused, reset, DNS...)
    Transport(String),

    /// The request did not complete in time
    Timeout,

    /// The backend answered with a non-success status code
    Status(u16, String),

    /// The response body could not be decoded
    Decode(String),
}

impl ClientError {
    /// Whether issuing the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Transport(_) | ClientError::Timeout => true,
            ClientError::Status(code, _) => *code >= 500,
            ClientError::Decode(_) => false,
        }
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            ClientError::Transport(e) => write!(f, "Transport error: {e}."),
            ClientError::Timeout => write!(f, "Request timed out."),
            ClientError::Status(code, e) => write!(f, "Backend returned {code}: {e}."),
            ClientError::Decode(e) => write!(f, "Could not decode response: {e}."),
        }
    }
}

impl std::error::Error for ClientError {}

/// Operations offered by the scoring backend.
///
/// Scoring itself happens server side; implementors only move requests
/// and responses.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Name of this client, used in logs
    fn get_name(&self) -> &str;

    /// Fetch the static infrastructure corpus
    async fn get_initial_map_data(&self) -> Result<InitialMapData, ClientError>;

    /// Score a single coordinate
    async fn score_feasibility(
        &self,
        request: FeasibilityRequest,
    ) -> Result<FeasibilityScore, ClientError>;

    /// Explain a previously computed score
    async fn get_reasoning(&self, request: ReasoningRequest)
        -> Result<ReasoningResponse, ClientError>;

    /// Find the best locations on the national grid
    async fn optimize_grid(&self, request: GridRequest) -> Result<GridResponse, ClientError>;

    /// Find the best locations within a radius of a center point
    async fn optimize_radius(&self, request: RadiusRequest)
        -> Result<RadiusResponse, ClientError>;

    /// Analyze nearby renewable supply for a site
    async fn analyze_power_supply(
        &self,
        request: PowerSupplyRequest,
    ) -> Result<PowerSupplyResponse, ClientError>;
}
