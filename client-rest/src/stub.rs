//! Canned-data implementation of the [`ScoringService`].
//!
//! Answers every request locally with deterministic values so that
//! sessions can run without a backend. Not a scoring model.

use crate::service::{ClientError, ScoringService};
use crate::types::*;
use async_trait::async_trait;
use serde_json::json;

/// Candidate sites used for grid answers
const GRID_SITES: [(f64, f64); 8] = [
    (23.84, 69.69),
    (22.25, 72.20),
    (21.70, 72.55),
    (19.07, 72.88),
    (13.08, 80.27),
    (17.69, 83.22),
    (8.76, 78.13),
    (26.91, 70.91),
];

/// Kilometers per degree of latitude, good enough for canned offsets
const KM_PER_DEGREE: f64 = 111.0;

/// Client returning canned responses
#[derive(Debug, Clone)]
pub struct StubClient {
    name: String,
}

impl StubClient {
    /// Create a new stub client
    pub fn new_client(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Deterministic sub-scores derived from the coordinate alone
fn sub_scores_for(coordinate: &Coordinate) -> SubScores {
    let power = 10.0 - ((coordinate.latitude - 23.0).abs() * 0.4).min(10.0);
    let market = 10.0 - ((coordinate.longitude - 72.8).abs() * 0.5).min(10.0);
    let logistics = 10.0 - ((coordinate.latitude - 19.0).abs() * 0.3).min(10.0);

    SubScores {
        power: round2(power),
        market: round2(market),
        logistics: round2(logistics),
    }
}

fn overall_for(sub_scores: &SubScores, weights: &Weights) -> f64 {
    round2(
        weights.power * sub_scores.power
            + weights.market * sub_scores.market
            + weights.logistics * sub_scores.logistics,
    )
}

fn scored(coordinate: Coordinate, weights: &Weights) -> ScoredLocation {
    let sub_scores = sub_scores_for(&coordinate);
    ScoredLocation {
        coordinate,
        overall_score: overall_for(&sub_scores, weights),
        sub_scores,
        distance_from_center: None,
        resolved_name: None,
    }
}

#[async_trait]
impl ScoringService for StubClient {
    fn get_name(&self) -> &str {
        &self.name
    }

    async fn get_initial_map_data(&self) -> Result<InitialMapData, ClientError> {
        client_warn!("(get_initial_map_data MOCK) {} client.", self.get_name());
        let value = json!({
            "renewables": { "type": "FeatureCollection", "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [69.69, 23.84] },
                  "properties": { "type": "solar", "capacity_mw": 300, "State": "Gujarat" } },
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [71.91, 27.02] },
                  "properties": { "type": "solar", "capacity_mw": 2245, "State": "Rajasthan" } },
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [77.72, 8.95] },
                  "properties": { "type": "wind", "capacity_mw": 1500, "State": "Tamil Nadu" } }
            ]},
            "demandCenters": { "type": "FeatureCollection", "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [72.20, 22.25] },
                  "properties": { "type": "demand", "name": "Dholera SIR" } },
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [72.55, 21.70] },
                  "properties": { "type": "demand", "name": "Dahej PCPIR" } }
            ]},
            "hubs": { "type": "FeatureCollection", "features": [
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [69.72, 22.74] },
                  "properties": { "type": "hub", "name": "Mundra Port" } },
                { "type": "Feature",
                  "geometry": { "type": "Point", "coordinates": [80.30, 13.10] },
                  "properties": { "type": "hub", "name": "Chennai Port" } }
            ]}
        });

        serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn score_feasibility(
        &self,
        request: FeasibilityRequest,
    ) -> Result<FeasibilityScore, ClientError> {
        client_warn!("(score_feasibility MOCK) {} client.", self.get_name());
        client_debug!("(score_feasibility MOCK) request: {:?}", request);
        let sub_scores = sub_scores_for(&request.coordinate);
        Ok(FeasibilityScore {
            coordinate: request.coordinate,
            overall_score: overall_for(&sub_scores, &request.weights),
            sub_scores,
            message: Some("Feasibility score for the specified coordinate.".to_string()),
        })
    }

    async fn get_reasoning(
        &self,
        request: ReasoningRequest,
    ) -> Result<ReasoningResponse, ClientError> {
        client_warn!("(get_reasoning MOCK) {} client.", self.get_name());
        Ok(ReasoningResponse {
            reasoning: format!(
                "The site scores {:.2} overall with power {:.2}, market {:.2} and logistics {:.2}.",
                request.scores.overall_score,
                request.scores.sub_scores.power,
                request.scores.sub_scores.market,
                request.scores.sub_scores.logistics
            ),
        })
    }

    async fn optimize_grid(&self, request: GridRequest) -> Result<GridResponse, ClientError> {
        client_warn!("(optimize_grid MOCK) {} client.", self.get_name());
        client_debug!("(optimize_grid MOCK) request: {:?}", request);
        let mut results: Vec<ScoredLocation> = GRID_SITES
            .iter()
            .map(|(lat, lng)| scored(Coordinate::new(*lat, *lng), &request.weights))
            .collect();

        results.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));
        results.truncate(request.num_results);

        Ok(GridResponse { results })
    }

    async fn optimize_radius(
        &self,
        request: RadiusRequest,
    ) -> Result<RadiusResponse, ClientError> {
        client_warn!("(optimize_radius MOCK) {} client.", self.get_name());
        client_debug!("(optimize_radius MOCK) request: {:?}", request);
        let center = request.center_point;
        let mut results: Vec<ScoredLocation> = (0..request.num_results)
            .map(|i| {
                let distance_km = request.radius * (i as f64 + 1.0) / (request.num_results as f64 + 1.0);
                let coordinate = Coordinate::new(
                    center.latitude + distance_km / KM_PER_DEGREE,
                    center.longitude,
                );
                let mut location = scored(coordinate, &request.weights);
                location.distance_from_center = Some(round2(distance_km));
                location
            })
            .collect();

        results.sort_by(|a, b| b.overall_score.total_cmp(&a.overall_score));

        Ok(RadiusResponse {
            results,
            grid_points_analyzed: Some(81),
        })
    }

    async fn analyze_power_supply(
        &self,
        request: PowerSupplyRequest,
    ) -> Result<PowerSupplyResponse, ClientError> {
        client_warn!("(analyze_power_supply MOCK) {} client.", self.get_name());
        client_debug!("(analyze_power_supply MOCK) request: {:?}", request);
        let nearest_plants = vec![
            NearbyPlant {
                state: "Gujarat".to_string(),
                kind: "solar".to_string(),
                capacity_mw: 300.0,
                distance_km: 42.5,
            },
            NearbyPlant {
                state: "Gujarat".to_string(),
                kind: "wind".to_string(),
                capacity_mw: 150.0,
                distance_km: 88.1,
            },
        ];
        let total: f64 = nearest_plants.iter().map(|p| p.capacity_mw).sum();
        let supply_score = if request.required_capacity_mw > 0.0 {
            round2((total / request.required_capacity_mw * 10.0).min(10.0))
        } else {
            0.0
        };

        Ok(PowerSupplyResponse {
            analysis: PowerSupplyAnalysis {
                nearest_plants,
                required_capacity_mw: request.required_capacity_mw,
                supply_score,
                total_available_capacity_mw: total,
            },
            reasoning: format!(
                "{total} MW of renewable capacity is available near the site against {} MW required.",
                request.required_capacity_mw
            ),
        })
    }
}
