//! test utilities. Provides scripted collaborators and sample data.

use crate::geospatial::naming::{Address, GeocodeError, ReverseGeocoder};
use crate::geospatial::Coordinate;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use svc_siting_client_rest::prelude::*;

/// Writes a debug! message to the test logger
#[macro_export]
macro_rules! ut_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "test", $($arg)+)
    };
}

/// Writes an info! message to the test logger
#[macro_export]
macro_rules! ut_info {
    ($($arg:tt)+) => {
        log::info!(target: "test", $($arg)+)
    };
}

/// Writes an warn! message to the test logger
#[macro_export]
macro_rules! ut_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "test", $($arg)+)
    };
}

/// Writes an error! message to the test logger
#[macro_export]
macro_rules! ut_error {
    ($($arg:tt)+) => {
        log::error!(target: "test", $($arg)+)
    };
}

/// Geocoder answering every lookup the same way
#[derive(Debug)]
pub struct FakeGeocoder {
    answer: Option<Address>,
    calls: AtomicUsize,
}

impl FakeGeocoder {
    /// Every lookup fails with a transport error
    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every lookup returns the given city and state
    pub fn named(city: &str, state: &str) -> Self {
        Self {
            answer: Some(Address {
                city: Some(city.to_string()),
                state: Some(state.to_string()),
                ..Default::default()
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReverseGeocoder for FakeGeocoder {
    async fn reverse(&self, _at: &Coordinate) -> Result<Address, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| GeocodeError::Transport("connection refused".to_string()))
    }
}

/// Geocoder naming each coordinate after its latitude, with a per-call
/// delay that shrinks so later lookups finish first.
#[derive(Debug, Default)]
pub struct ReversedLatencyGeocoder {
    calls: AtomicUsize,
}

#[async_trait]
impl ReverseGeocoder for ReversedLatencyGeocoder {
    async fn reverse(&self, at: &Coordinate) -> Result<Address, GeocodeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u64;
        tokio::time::sleep(Duration::from_millis(60u64.saturating_sub(n * 20))).await;
        Ok(Address {
            city: Some(format!("Site{:.0}", at.latitude)),
            state: Some("Gujarat".to_string()),
            ..Default::default()
        })
    }
}

/// Scoring backend operations the fake can script
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    MapData,
    Feasibility,
    Reasoning,
    Grid,
    Radius,
    PowerSupply,
}

/// Scoring service with scripted latency and failures, counting calls
#[derive(Debug, Default)]
pub struct FakeScoring {
    calls: Mutex<HashMap<Op, usize>>,
    delays: Mutex<HashMap<Op, VecDeque<Duration>>>,
    failing: Mutex<HashSet<Op>>,
}

impl FakeScoring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue delays for the next calls of `op`, consumed in order
    pub fn delay(self, op: Op, delays: &[u64]) -> Self {
        if let Ok(mut map) = self.delays.lock() {
            map.entry(op)
                .or_default()
                .extend(delays.iter().map(|ms| Duration::from_millis(*ms)));
        }
        self
    }

    /// Make every call of `op` fail with a 503
    pub fn fail(self, op: Op) -> Self {
        if let Ok(mut set) = self.failing.lock() {
            set.insert(op);
        }
        self
    }

    /// Start or stop failing `op` on an already shared fake
    pub fn set_failing(&self, op: Op, failing: bool) {
        if let Ok(mut set) = self.failing.lock() {
            if failing {
                set.insert(op);
            } else {
                set.remove(&op);
            }
        }
    }

    pub fn calls(&self, op: Op) -> usize {
        self.calls
            .lock()
            .map(|map| map.get(&op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .map(|map| map.values().sum())
            .unwrap_or(0)
    }

    async fn enter(&self, op: Op) -> Result<(), ClientError> {
        if let Ok(mut map) = self.calls.lock() {
            *map.entry(op).or_insert(0) += 1;
        }

        let delay = self
            .delays
            .lock()
            .ok()
            .and_then(|mut map| map.get_mut(&op).and_then(|q| q.pop_front()));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failing
            .lock()
            .map(|set| set.contains(&op))
            .unwrap_or(false);
        if failing {
            return Err(ClientError::Status(503, format!("{op:?} unavailable")));
        }

        Ok(())
    }
}

fn sub_scores(seed: f64) -> SubScores {
    SubScores {
        power: (seed % 10.0).abs(),
        market: 6.5,
        logistics: 4.5,
    }
}

/// A scored location whose score encodes its position in the batch
pub fn scored(latitude: f64, longitude: f64, score: f64) -> ScoredLocation {
    ScoredLocation {
        coordinate: Coordinate::new(latitude, longitude),
        overall_score: score,
        sub_scores: sub_scores(score),
        distance_from_center: None,
        resolved_name: None,
    }
}

#[async_trait]
impl ScoringService for FakeScoring {
    fn get_name(&self) -> &str {
        "fake"
    }

    async fn get_initial_map_data(&self) -> Result<InitialMapData, ClientError> {
        self.enter(Op::MapData).await?;
        Ok(sample_map_data())
    }

    async fn score_feasibility(
        &self,
        request: FeasibilityRequest,
    ) -> Result<FeasibilityScore, ClientError> {
        self.enter(Op::Feasibility).await?;
        Ok(FeasibilityScore {
            coordinate: request.coordinate,
            // the score identifies which request answered
            overall_score: request.coordinate.latitude,
            sub_scores: sub_scores(request.coordinate.latitude),
            message: None,
        })
    }

    async fn get_reasoning(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ClientError> {
        self.enter(Op::Reasoning).await?;
        Ok(ReasoningResponse {
            reasoning: format!("Reasoning for {:.1}", request.scores.overall_score),
        })
    }

    async fn optimize_grid(&self, request: GridRequest) -> Result<GridResponse, ClientError> {
        self.enter(Op::Grid).await?;
        let results = (0..request.num_results)
            .map(|i| scored(20.0 + i as f64, 72.0, 9.0 - i as f64))
            .collect();
        Ok(GridResponse { results })
    }

    async fn optimize_radius(&self, request: RadiusRequest) -> Result<RadiusResponse, ClientError> {
        self.enter(Op::Radius).await?;
        let center = request.center_point;
        let results = (0..request.num_results)
            .map(|i| {
                let mut location = scored(
                    center.latitude + 0.1 * (i + 1) as f64,
                    center.longitude,
                    8.0 - i as f64,
                );
                // first result carries the server distance, others are left to the client
                if i == 0 {
                    location.distance_from_center = Some(11.1);
                }
                location
            })
            .collect();
        Ok(RadiusResponse {
            results,
            grid_points_analyzed: Some(81),
        })
    }

    async fn analyze_power_supply(
        &self,
        request: PowerSupplyRequest,
    ) -> Result<PowerSupplyResponse, ClientError> {
        self.enter(Op::PowerSupply).await?;
        Ok(PowerSupplyResponse {
            analysis: PowerSupplyAnalysis {
                nearest_plants: vec![NearbyPlant {
                    state: "Gujarat".to_string(),
                    kind: "solar".to_string(),
                    capacity_mw: 300.0,
                    distance_km: 12.5,
                }],
                required_capacity_mw: request.required_capacity_mw,
                supply_score: 6.0,
                total_available_capacity_mw: 300.0,
            },
            reasoning: "One solar plant nearby.".to_string(),
        })
    }
}

/// Corpus with every layer kind and the awkward cases of the property bag
pub fn sample_map_data() -> InitialMapData {
    let value = json!({
        "renewables": { "type": "FeatureCollection", "features": [
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [69.69, 23.84] },
              "properties": { "type": "solar", "capacity_mw": 300, "State": "Gujarat", "Sl. No.": 1 } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [71.91, 27.02] },
              "properties": { "type": "Solar", "plant_name": "Bhadla Solar Park", "capacity_mw": 2245, "State": "Rajasthan" } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [77.72, 8.95] },
              "properties": { "type": "wind", "Capacity": 1500, "state": "Tamil Nadu" } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [76.0, 15.0] },
              "properties": { "type": "hydro", "capacity_mw": 90 } },
            { "type": "Feature",
              "geometry": null,
              "properties": { "type": "solar", "capacity_mw": 10 } }
        ]},
        "demandCenters": { "type": "FeatureCollection", "features": [
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [72.20, 22.25] },
              "properties": { "name": "Dholera SIR", "zone_type": "Industrial", "meta": { "source": "x" } } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [72.55, 21.70] },
              "properties": { "zone_name": "Dahej PCPIR", "active": true } }
        ]},
        "hubs": { "type": "FeatureCollection", "features": [
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [69.72, 22.74] },
              "properties": { "port_name": "Mundra Port" } },
            { "type": "Feature",
              "geometry": { "type": "Point", "coordinates": [80.30, 13.10] },
              "properties": { "operator": "Chennai Port Trust" } }
        ]}
    });

    match serde_json::from_value(value) {
        Ok(data) => data,
        Err(e) => panic!("sample map data does not parse: {e}"),
    }
}
