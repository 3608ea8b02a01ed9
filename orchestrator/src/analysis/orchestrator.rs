//! The analysis state machine.
//!
//! Four independent pipelines share one published [`AppState`]. Each
//! dispatch validates its inputs, enters Pending with a fresh ticket,
//! calls the scoring backend under a timeout and applies the outcome only
//! if no newer dispatch of the same kind has started since.

use super::format::{rank_sites, Recommendation};
use super::state::{
    AppState, FeasibilityOutcome, OptimizedOverlay, RankedBatch, ReasoningState, RequestState,
    Ticket,
};
use super::weights::SliderValues;
use super::{AnalysisError, AnalysisKind, TransportError, ValidationError};
use crate::config::Config;
use crate::geospatial::haversine::{annotate_distances, within_radius};
use crate::geospatial::naming::LocationNameResolver;
use crate::geospatial::Coordinate;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use svc_siting_client_rest::prelude::*;
use tokio::sync::watch;

/// Number of locations requested from a radius search
pub const RADIUS_NUM_RESULTS: usize = 3;

/// Settings of the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Upper bound for every backend call
    pub request_timeout: Duration,

    /// Number of locations requested from a grid search
    pub grid_num_results: usize,

    /// Initial radius, in kilometers
    pub default_radius_km: f64,

    /// Initial required capacity, in megawatts
    pub default_required_capacity_mw: f64,
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            grid_num_results: config.grid_num_results,
            default_radius_km: config.default_radius_km,
            default_required_capacity_mw: config.default_required_capacity_mw,
        }
    }
}

/// How a dispatch ended when it did not fail
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The result was published
    Applied,

    /// A newer dispatch of the same kind started first; nothing was published
    Superseded,
}

/// How a map click was interpreted
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ClickRoute {
    /// The click picked the radius search center
    RadiusCenter,

    /// The click selected a location to score
    Feasibility,
}

fn feasibility_slot(s: &mut AppState) -> &mut RequestState<FeasibilityOutcome> {
    &mut s.feasibility
}

fn grid_slot(s: &mut AppState) -> &mut RequestState<RankedBatch> {
    &mut s.grid
}

fn radius_slot(s: &mut AppState) -> &mut RequestState<RankedBatch> {
    &mut s.radius_search
}

fn power_supply_slot(s: &mut AppState) -> &mut RequestState<PowerSupplyResponse> {
    &mut s.power_supply
}

/// Coordinates analysis requests against the scoring backend
pub struct AnalysisOrchestrator {
    client: Arc<dyn ScoringService>,
    resolver: Arc<LocationNameResolver>,
    config: OrchestratorConfig,
    state: watch::Sender<AppState>,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("client", &self.client.get_name())
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisOrchestrator {
    pub fn new(
        client: Arc<dyn ScoringService>,
        resolver: Arc<LocationNameResolver>,
        config: OrchestratorConfig,
    ) -> Self {
        let initial = AppState::new(
            config.default_radius_km,
            config.default_required_capacity_mw,
        );
        let (state, _) = watch::channel(initial);

        Self {
            client,
            resolver,
            config,
            state,
        }
    }

    /// Receive every published state change
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn set_sliders(&self, sliders: SliderValues) {
        self.state.send_if_modified(|s| {
            let changed = s.sliders != sliders;
            s.sliders = sliders;
            changed
        });
    }

    /// Set or clear the selected point
    pub fn set_pinpoint(&self, pinpoint: Option<Coordinate>) {
        self.state.send_modify(|s| s.pinpoint = pinpoint);
    }

    /// Set the capacity used for power supply analysis
    pub fn set_required_capacity(&self, capacity_mw: f64) -> Result<(), ValidationError> {
        if !capacity_mw.is_finite() || capacity_mw <= 0.0 {
            return Err(ValidationError::InvalidCapacity(capacity_mw));
        }

        self.state.send_modify(|s| s.required_capacity_mw = capacity_mw);
        Ok(())
    }

    /// Set the search radius. Any positive radius is accepted.
    pub fn set_radius_km(&self, radius_km: f64) -> Result<(), ValidationError> {
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(ValidationError::InvalidRadius(radius_km));
        }

        self.state.send_modify(|s| s.radius.radius_km = radius_km);
        Ok(())
    }

    /// Flip radius mode, returning the new mode.
    ///
    /// Turning it on forgets the previous center point. Turning it off also
    /// drops the radius results, and their markers if they are the ones shown.
    pub fn toggle_radius_mode(&self) -> bool {
        let mut active = false;
        self.state.send_modify(|s| {
            s.radius.active = !s.radius.active;
            s.radius.center_point = None;

            if !s.radius.active {
                s.radius_search.reset();
                if matches!(&s.optimized, Some(o) if o.source == AnalysisKind::Radius) {
                    s.optimized = None;
                }
                if matches!(&s.validation, Some((kind, _)) if *kind == AnalysisKind::Radius) {
                    s.validation = None;
                }
            }

            active = s.radius.active;
        });

        analysis_info!("(toggle_radius_mode) radius mode {}.", if active { "on" } else { "off" });
        active
    }

    /// Interpret a map click.
    ///
    /// The click always becomes the pinpoint. In radius mode it also
    /// becomes the search center and no scoring should follow.
    pub fn route_click(&self, at: Coordinate) -> ClickRoute {
        let mut route = ClickRoute::Feasibility;
        self.state.send_modify(|s| {
            s.pinpoint = Some(at);
            if s.radius.active {
                s.radius.center_point = Some(at);
                route = ClickRoute::RadiusCenter;
            }
        });

        analysis_debug!(
            "(route_click) ({}, {}) routed to {:?}.",
            at.latitude,
            at.longitude,
            route
        );
        route
    }

    /// Move the pinpoint to a ranked result. Returns its coordinate.
    pub fn select_result(&self, kind: AnalysisKind, rank: usize) -> Option<Coordinate> {
        let coordinate = {
            let state = self.state.borrow();
            let batch = match kind {
                AnalysisKind::Grid => state.grid.result.as_ref(),
                AnalysisKind::Radius => state.radius_search.result.as_ref(),
                _ => None,
            };
            batch
                .and_then(|b| b.sites.iter().find(|site| site.rank == rank))
                .map(|site| site.coordinate)
        };

        match coordinate {
            Some(at) => {
                self.set_pinpoint(Some(at));
                Some(at)
            }
            None => {
                analysis_warn!("(select_result) no {} result with rank {}.", kind, rank);
                None
            }
        }
    }

    /// Fetch the static infrastructure corpus
    pub async fn load_map_data(&self) -> Result<InitialMapData, TransportError> {
        match tokio::time::timeout(self.config.request_timeout, self.client.get_initial_map_data())
            .await
        {
            Ok(Ok(data)) => {
                analysis_info!(
                    "(load_map_data) loaded {} renewables, {} demand centers, {} hubs.",
                    data.renewables.features.len(),
                    data.demand_centers.features.len(),
                    data.hubs.features.len()
                );
                Ok(data)
            }
            Ok(Err(e)) => {
                analysis_error!("(load_map_data) {}", e);
                Err(e.into())
            }
            Err(_) => {
                analysis_error!("(load_map_data) timed out.");
                Err(TransportError {
                    message: format!(
                        "map data request timed out after {} ms",
                        self.config.request_timeout.as_millis()
                    ),
                    retryable: true,
                })
            }
        }
    }

    /// Score a location, then ask for the reasoning behind the score.
    ///
    /// A failed score skips the reasoning call. A failed reasoning call
    /// keeps the score and is not reported as an error.
    pub async fn dispatch_feasibility(
        &self,
        at: Coordinate,
    ) -> Result<DispatchOutcome, AnalysisError> {
        let kind = AnalysisKind::Feasibility;
        let weights = self.weights(kind)?;
        let Some(ticket) = self.begin(feasibility_slot) else {
            return Ok(DispatchOutcome::Superseded);
        };

        let request = FeasibilityRequest {
            coordinate: at,
            weights,
        };
        let score = match self
            .call(&ticket, self.client.score_feasibility(request))
            .await
        {
            Ok(score) => score,
            Err(e) => return self.settle(feasibility_slot, &ticket, Err(e), |_| {}),
        };

        let recommendation = Recommendation::from_score(score.overall_score);
        analysis_debug!(
            "(dispatch_feasibility) [{}] score {}: {}.",
            ticket.request_id,
            score.overall_score,
            recommendation
        );
        let outcome = FeasibilityOutcome {
            score: score.clone(),
            recommendation,
            reasoning: ReasoningState::Pending,
        };
        if self.settle(feasibility_slot, &ticket, Ok(outcome), |_| {})?
            == DispatchOutcome::Superseded
        {
            return Ok(DispatchOutcome::Superseded);
        }

        let request = ReasoningRequest { scores: score, weights };
        let reasoning = match self.call(&ticket, self.client.get_reasoning(request)).await {
            Ok(response) => ReasoningState::Ready(response.reasoning),
            Err(e) => {
                analysis_warn!(
                    "(dispatch_feasibility) [{}] reasoning unavailable: {}",
                    ticket.request_id,
                    e
                );
                ReasoningState::Failed(e.message)
            }
        };

        if self.apply(|s| s.feasibility.update(&ticket, |o| o.reasoning = reasoning)) {
            Ok(DispatchOutcome::Applied)
        } else {
            analysis_debug!(
                "(dispatch_feasibility) [{}] reasoning superseded.",
                ticket.request_id
            );
            Ok(DispatchOutcome::Superseded)
        }
    }

    /// Find the best locations nation wide
    pub async fn dispatch_grid(&self) -> Result<DispatchOutcome, AnalysisError> {
        let kind = AnalysisKind::Grid;
        let weights = self.weights(kind)?;
        let Some(ticket) = self.begin(grid_slot) else {
            return Ok(DispatchOutcome::Superseded);
        };

        let request = GridRequest {
            weights,
            num_results: self.config.grid_num_results,
        };
        let outcome = match self.call(&ticket, self.client.optimize_grid(request)).await {
            Ok(response) => {
                if !self.is_current(&ticket) {
                    return Ok(self.superseded(&ticket));
                }
                Ok(self.rank(kind, response.results, None, None).await)
            }
            Err(e) => Err(e),
        };

        self.settle_batch(grid_slot, &ticket, outcome)
    }

    /// Find the best locations around the radius center
    pub async fn dispatch_radius(&self) -> Result<DispatchOutcome, AnalysisError> {
        let kind = AnalysisKind::Radius;
        let radius = self.state.borrow().radius.clone();

        if !radius.active {
            return Err(self.reject(kind, ValidationError::RadiusModeInactive));
        }
        let Some(center_point) = radius.center_point else {
            return Err(self.reject(kind, ValidationError::MissingCenterPoint));
        };
        if !radius.radius_km.is_finite() || radius.radius_km <= 0.0 {
            return Err(self.reject(kind, ValidationError::InvalidRadius(radius.radius_km)));
        }

        let weights = self.weights(kind)?;
        let Some(ticket) = self.begin(radius_slot) else {
            return Ok(DispatchOutcome::Superseded);
        };

        let request = RadiusRequest {
            center_point,
            radius: radius.radius_km,
            weights,
            num_results: RADIUS_NUM_RESULTS,
        };
        let outcome = match self.call(&ticket, self.client.optimize_radius(request)).await {
            Ok(response) => {
                if !self.is_current(&ticket) {
                    return Ok(self.superseded(&ticket));
                }
                Ok(self
                    .rank(
                        kind,
                        response.results,
                        Some((center_point, radius.radius_km)),
                        response.grid_points_analyzed,
                    )
                    .await)
            }
            Err(e) => Err(e),
        };

        self.settle_batch(radius_slot, &ticket, outcome)
    }

    /// Analyze renewable supply around the pinpoint.
    ///
    /// Without a pinpoint nothing is dispatched and nothing is published.
    pub async fn dispatch_power_supply(&self) -> Result<DispatchOutcome, AnalysisError> {
        let kind = AnalysisKind::PowerSupply;
        let (pinpoint, required_capacity_mw) = {
            let state = self.state.borrow();
            (state.pinpoint, state.required_capacity_mw)
        };

        let Some(coordinate) = pinpoint else {
            analysis_error!("(dispatch_power_supply) no pinpoint selected, nothing to analyze.");
            return Err(ValidationError::MissingPinpoint.into());
        };
        if !required_capacity_mw.is_finite() || required_capacity_mw <= 0.0 {
            return Err(self.reject(kind, ValidationError::InvalidCapacity(required_capacity_mw)));
        }

        let Some(ticket) = self.begin(power_supply_slot) else {
            return Ok(DispatchOutcome::Superseded);
        };

        let request = PowerSupplyRequest {
            coordinate,
            required_capacity_mw,
        };
        let outcome = self
            .call(&ticket, self.client.analyze_power_supply(request))
            .await;

        self.settle(power_supply_slot, &ticket, outcome, |_| {})
    }

    /// Current weights, publishing a validation error when they are degenerate
    fn weights(&self, kind: AnalysisKind) -> Result<Weights, AnalysisError> {
        let sliders = self.state.borrow().sliders;
        sliders.normalized().map_err(|e| self.reject(kind, e))
    }

    fn reject(&self, kind: AnalysisKind, e: ValidationError) -> AnalysisError {
        analysis_warn!("({} dispatch) rejected: {}", kind, e);
        self.state.send_modify(|s| s.validation = Some((kind, e.clone())));
        AnalysisError::Validation(e)
    }

    fn begin<T>(&self, slot: fn(&mut AppState) -> &mut RequestState<T>) -> Option<Ticket> {
        let mut ticket = None;
        self.state.send_modify(|s| {
            let t = slot(s).begin();
            if matches!(&s.validation, Some((kind, _)) if *kind == t.kind) {
                s.validation = None;
            }
            ticket = Some(t);
        });

        if let Some(t) = &ticket {
            analysis_info!(
                "({} dispatch) [{}] generation {} pending.",
                t.kind,
                t.request_id,
                t.generation
            );
        }
        ticket
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        let state = self.state.borrow();
        match ticket.kind {
            AnalysisKind::Feasibility => state.feasibility.is_current(ticket),
            AnalysisKind::Grid => state.grid.is_current(ticket),
            AnalysisKind::Radius => state.radius_search.is_current(ticket),
            AnalysisKind::PowerSupply => state.power_supply.is_current(ticket),
        }
    }

    /// Run `f` against the state, notifying subscribers when it returns true
    fn apply<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut AppState) -> bool,
    {
        let mut applied = false;
        self.state.send_if_modified(|s| {
            applied = f(s);
            applied
        });
        applied
    }

    fn superseded(&self, ticket: &Ticket) -> DispatchOutcome {
        analysis_debug!(
            "({} dispatch) [{}] generation {} superseded, response discarded.",
            ticket.kind,
            ticket.request_id,
            ticket.generation
        );
        DispatchOutcome::Superseded
    }

    async fn call<T, F>(&self, ticket: &Ticket, request: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        match tokio::time::timeout(self.config.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                analysis_warn!(
                    "({} dispatch) [{}] backend error: {}",
                    ticket.kind,
                    ticket.request_id,
                    e
                );
                Err(e.into())
            }
            Err(_) => {
                analysis_warn!(
                    "({} dispatch) [{}] timed out.",
                    ticket.kind,
                    ticket.request_id
                );
                Err(TransportError::timeout(ticket.kind, self.config.request_timeout))
            }
        }
    }

    /// Publish the outcome of a dispatch if its ticket is still current
    fn settle<T, F>(
        &self,
        slot: fn(&mut AppState) -> &mut RequestState<T>,
        ticket: &Ticket,
        outcome: Result<T, TransportError>,
        on_success: F,
    ) -> Result<DispatchOutcome, AnalysisError>
    where
        F: FnOnce(&mut AppState),
    {
        match outcome {
            Ok(value) => {
                let applied = self.apply(|s| {
                    let applied = slot(s).succeed(ticket, value);
                    if applied {
                        on_success(s);
                    }
                    applied
                });

                if applied {
                    analysis_info!("({} dispatch) [{}] success.", ticket.kind, ticket.request_id);
                    Ok(DispatchOutcome::Applied)
                } else {
                    Ok(self.superseded(ticket))
                }
            }
            Err(e) => {
                if self.apply(|s| slot(s).fail(ticket, e.message.clone(), e.retryable)) {
                    Err(e.into())
                } else {
                    Ok(self.superseded(ticket))
                }
            }
        }
    }

    /// Publish a ranked batch and show it as the optimized overlay
    fn settle_batch(
        &self,
        slot: fn(&mut AppState) -> &mut RequestState<RankedBatch>,
        ticket: &Ticket,
        outcome: Result<RankedBatch, TransportError>,
    ) -> Result<DispatchOutcome, AnalysisError> {
        let overlay = outcome.as_ref().ok().map(|batch| OptimizedOverlay {
            source: ticket.kind,
            locations: batch.raw.clone(),
        });

        self.settle(slot, ticket, outcome, |s| s.optimized = overlay)
    }

    /// Resolve names for a batch and format it, keeping backend order
    async fn rank(
        &self,
        kind: AnalysisKind,
        mut locations: Vec<ScoredLocation>,
        search: Option<(Coordinate, f64)>,
        grid_points_analyzed: Option<u64>,
    ) -> RankedBatch {
        if let Some((center, radius_km)) = search {
            annotate_distances(&center, &mut locations);

            // the backend stays authoritative, outliers are only reported
            let inside = within_radius(&center, radius_km, &locations, |l| l.coordinate).len();
            if inside < locations.len() {
                analysis_warn!(
                    "({} dispatch) {} of {} result(s) lie beyond {} km.",
                    kind,
                    locations.len() - inside,
                    locations.len(),
                    radius_km
                );
            }
        }

        let names = join_all(
            locations
                .iter()
                .map(|location| self.resolver.resolve(&location.coordinate)),
        )
        .await;

        for (location, name) in locations.iter_mut().zip(names.iter()) {
            location.resolved_name = Some(name.clone());
        }

        RankedBatch {
            sites: rank_sites(kind, &locations, &names),
            raw: locations,
            grid_points_analyzed,
        }
    }
}
