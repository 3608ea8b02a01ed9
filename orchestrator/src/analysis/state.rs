//! Published application state and the per-kind request state machine.
//!
//! Every dispatch stamps a [`Ticket`] with the current generation of its
//! kind and then increments it. A response is applied only when its
//! ticket is still the latest for that kind, so the last dispatch wins
//! regardless of the order responses arrive in.

use super::format::{RankedSite, Recommendation};
use super::weights::SliderValues;
use super::{AnalysisKind, ValidationError};
use crate::geospatial::Coordinate;
use chrono::{DateTime, Utc};
use svc_siting_client_rest::types::{FeasibilityScore, PowerSupplyResponse, ScoredLocation};
use uuid::Uuid;

/// Progress of one analysis pipeline
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RequestStatus {
    /// Never dispatched
    #[default]
    Idle,

    /// Waiting for the backend
    Pending,

    /// Latest dispatch succeeded
    Success,

    /// Latest dispatch failed
    Error,
}

/// Stamp handed out on dispatch and checked on completion
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ticket {
    /// Kind the ticket belongs to
    pub kind: AnalysisKind,

    /// Generation of the kind at dispatch time
    pub generation: u64,

    /// Identifier used in logs
    pub request_id: Uuid,
}

/// State of one analysis kind
#[derive(Debug, Clone)]
pub struct RequestState<T> {
    kind: AnalysisKind,
    next_generation: u64,

    /// Current status
    pub status: RequestStatus,

    /// Result of the latest successful dispatch
    pub result: Option<T>,

    /// Message of the latest failure
    pub error: Option<String>,

    /// Whether the latest failure may succeed when dispatched again
    pub retryable: bool,

    /// Identifier of the latest dispatch
    pub request_id: Option<Uuid>,

    /// When the latest dispatch was issued
    pub dispatched_at: Option<DateTime<Utc>>,

    /// When the latest dispatch completed
    pub completed_at: Option<DateTime<Utc>>,
}

impl<T> RequestState<T> {
    pub fn new(kind: AnalysisKind) -> Self {
        Self {
            kind,
            next_generation: 0,
            status: RequestStatus::Idle,
            result: None,
            error: None,
            retryable: false,
            request_id: None,
            dispatched_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// Enter Pending for a new dispatch, superseding any request in flight.
    ///
    /// The previous error is cleared. The last good result is kept until a
    /// newer dispatch of this kind succeeds.
    pub fn begin(&mut self) -> Ticket {
        let ticket = Ticket {
            kind: self.kind,
            generation: self.next_generation,
            request_id: Uuid::new_v4(),
        };
        self.next_generation += 1;

        self.status = RequestStatus::Pending;
        self.error = None;
        self.retryable = false;
        self.request_id = Some(ticket.request_id);
        self.dispatched_at = Some(Utc::now());
        self.completed_at = None;

        ticket
    }

    /// Whether `ticket` belongs to the latest dispatch of this kind
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        ticket.kind == self.kind && ticket.generation + 1 == self.next_generation
    }

    /// Apply a successful result. Returns false for a stale ticket.
    pub fn succeed(&mut self, ticket: &Ticket, value: T) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.status = RequestStatus::Success;
        self.result = Some(value);
        self.completed_at = Some(Utc::now());
        true
    }

    /// Apply a failure. Returns false for a stale ticket.
    pub fn fail(&mut self, ticket: &Ticket, message: String, retryable: bool) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.status = RequestStatus::Error;
        self.error = Some(message);
        self.retryable = retryable;
        self.completed_at = Some(Utc::now());
        true
    }

    /// Modify the current result in place, for follow up steps of a
    /// dispatch. Returns false for a stale ticket or when there is no result.
    pub fn update<F>(&mut self, ticket: &Ticket, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        if !self.is_current(ticket) {
            return false;
        }

        match self.result.as_mut() {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }

    /// Return to Idle, discarding the result and any request in flight
    pub fn reset(&mut self) {
        self.next_generation += 1;
        self.status = RequestStatus::Idle;
        self.result = None;
        self.error = None;
        self.retryable = false;
        self.request_id = None;
        self.dispatched_at = None;
        self.completed_at = None;
    }
}

/// Radius search mode
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusSession {
    /// Whether clicks pick a center point instead of scoring a location
    pub active: bool,

    /// Selected center point
    pub center_point: Option<Coordinate>,

    /// Search radius in kilometers
    pub radius_km: f64,
}

/// Second step of a feasibility dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum ReasoningState {
    /// Requested, not yet answered
    Pending,

    /// Narrative explanation of the score
    Ready(String),

    /// The reasoning call failed; the score stays valid
    Failed(String),
}

/// Result of a feasibility dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct FeasibilityOutcome {
    pub score: FeasibilityScore,
    pub recommendation: Recommendation,
    pub reasoning: ReasoningState,
}

/// Formatted result of a grid or radius dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBatch {
    /// Display entries in backend rank order
    pub sites: Vec<RankedSite>,

    /// Locations as returned by the backend, used for the map overlay
    pub raw: Vec<ScoredLocation>,

    /// Number of candidates the backend evaluated, when reported
    pub grid_points_analyzed: Option<u64>,
}

/// Locations currently shown as optimized markers
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedOverlay {
    /// Kind of the batch the markers come from
    pub source: AnalysisKind,

    pub locations: Vec<ScoredLocation>,
}

/// Everything the map and panels render from
#[derive(Debug, Clone)]
pub struct AppState {
    pub sliders: SliderValues,

    /// The selected point, at most one
    pub pinpoint: Option<Coordinate>,

    pub radius: RadiusSession,

    /// Capacity used for power supply analysis, in megawatts
    pub required_capacity_mw: f64,

    pub feasibility: RequestState<FeasibilityOutcome>,
    pub grid: RequestState<RankedBatch>,
    pub radius_search: RequestState<RankedBatch>,
    pub power_supply: RequestState<PowerSupplyResponse>,

    /// Most recent successful grid or radius batch
    pub optimized: Option<OptimizedOverlay>,

    /// Latest dispatch rejected before reaching the backend
    pub validation: Option<(AnalysisKind, ValidationError)>,
}

impl AppState {
    pub fn new(radius_km: f64, required_capacity_mw: f64) -> Self {
        Self {
            sliders: SliderValues::default(),
            pinpoint: None,
            radius: RadiusSession {
                active: false,
                center_point: None,
                radius_km,
            },
            required_capacity_mw,
            feasibility: RequestState::new(AnalysisKind::Feasibility),
            grid: RequestState::new(AnalysisKind::Grid),
            radius_search: RequestState::new(AnalysisKind::Radius),
            power_supply: RequestState::new(AnalysisKind::PowerSupply),
            optimized: None,
            validation: None,
        }
    }

    /// Status of every kind, for logs
    pub fn statuses(&self) -> [(AnalysisKind, RequestStatus); 4] {
        [
            (AnalysisKind::Feasibility, self.feasibility.status),
            (AnalysisKind::Grid, self.grid.status),
            (AnalysisKind::Radius, self.radius_search.status),
            (AnalysisKind::PowerSupply, self.power_supply.status),
        ]
    }
}
