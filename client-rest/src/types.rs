//! Wire types exchanged with the scoring backend.
//!
//! Field names follow the backend's JSON exactly; Rust names are
//! snake_case and mapped with serde attributes.

use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};

/// A geographic point in decimal degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// The latitude of the point.
    pub latitude: f64,

    /// The longitude of the point.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new [`Coordinate`] from latitude and longitude degrees
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Criterion weights as sent to the backend.
///
/// The backend expects these to be normalized; callers are responsible
/// for making sure they sum to one.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    /// Importance of proximity to renewable power
    pub power: f64,

    /// Importance of proximity to demand centers
    pub market: f64,

    /// Importance of proximity to logistics hubs
    pub logistics: f64,
}

/// Per-criterion scores, each on a 0-10 scale
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    /// Power availability score
    pub power: f64,

    /// Market proximity score
    pub market: f64,

    /// Logistics score
    pub logistics: f64,
}

/// One ranked location returned by a grid or radius search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredLocation {
    /// Where the location is
    #[serde(flatten)]
    pub coordinate: Coordinate,

    /// Weighted overall score, 0-10
    pub overall_score: f64,

    /// The three criterion scores
    pub sub_scores: SubScores,

    /// Distance to the search center in kilometers, radius searches only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_from_center: Option<f64>,

    /// Human readable place name, filled in client side
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_name: Option<String>,
}

/// Initial static infrastructure corpus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialMapData {
    /// Solar and wind plants, distinguished by each feature's `type` property
    pub renewables: FeatureCollection,

    /// Demand centers (industrial zones)
    #[serde(rename = "demandCenters")]
    pub demand_centers: FeatureCollection,

    /// Logistics hubs (ports)
    pub hubs: FeatureCollection,
}

/// Request body for a single point feasibility score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityRequest {
    /// Point to score
    pub coordinate: Coordinate,

    /// Normalized weights
    pub weights: Weights,
}

/// Feasibility score for one coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityScore {
    /// The scored point, echoed back by the backend
    #[serde(flatten)]
    pub coordinate: Coordinate,

    /// Weighted overall score, 0-10
    pub overall_score: f64,

    /// The three criterion scores
    pub sub_scores: SubScores,

    /// Informational message from the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request body for the narrative reasoning of a score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// The score being explained, passed verbatim
    pub scores: FeasibilityScore,

    /// The weights that produced the score
    pub weights: Weights,
}

/// Narrative reasoning text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningResponse {
    /// Free-form explanation
    pub reasoning: String,
}

/// Request body for a country-wide grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRequest {
    /// Normalized weights
    pub weights: Weights,

    /// How many top locations to return
    pub num_results: usize,
}

/// Ranked grid search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridResponse {
    /// Best first
    pub results: Vec<ScoredLocation>,
}

/// Request body for a radius constrained search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusRequest {
    /// Center of the search circle
    pub center_point: Coordinate,

    /// Search radius in kilometers
    pub radius: f64,

    /// Normalized weights
    pub weights: Weights,

    /// How many top locations to return
    pub num_results: usize,
}

/// Ranked radius search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiusResponse {
    /// Best first, each annotated with its distance from the center
    pub results: Vec<ScoredLocation>,

    /// Number of candidate points the backend evaluated
    #[serde(default)]
    pub grid_points_analyzed: Option<u64>,
}

/// Request body for a power supply adequacy analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerSupplyRequest {
    /// Site to analyze
    pub coordinate: Coordinate,

    /// Capacity the site needs, in megawatts
    pub required_capacity_mw: f64,
}

/// A renewable plant near the analyzed site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlant {
    /// State the plant is located in
    #[serde(rename = "State", default)]
    pub state: String,

    /// Plant type, `solar` or `wind`
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Installed capacity in megawatts
    pub capacity_mw: f64,

    /// Great-circle distance to the site in kilometers
    pub distance_km: f64,
}

/// Numeric part of a power supply analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupplyAnalysis {
    /// Closest plants, nearest first
    pub nearest_plants: Vec<NearbyPlant>,

    /// Echo of the requested capacity
    pub required_capacity_mw: f64,

    /// Adequacy score, 0-10
    pub supply_score: f64,

    /// Combined capacity of `nearest_plants`
    pub total_available_capacity_mw: f64,
}

/// Power supply analysis and its narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSupplyResponse {
    /// Numeric analysis
    pub analysis: PowerSupplyAnalysis,

    /// Narrative explanation
    pub reasoning: String,
}
