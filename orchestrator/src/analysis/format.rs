//! Display formatting of analysis results

use super::AnalysisKind;
use crate::geospatial::Coordinate;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use svc_siting_client_rest::types::ScoredLocation;

/// Qualitative grade of a 0 to 10 sub-score
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Grade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            Grade::Excellent
        } else if score >= 6.0 {
            Grade::Good
        } else if score >= 4.0 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Grade::Excellent => write!(f, "Excellent"),
            Grade::Good => write!(f, "Good"),
            Grade::Fair => write!(f, "Fair"),
            Grade::Poor => write!(f, "Poor"),
        }
    }
}

/// Verdict shown next to a feasibility score
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum Recommendation {
    HighlyRecommended,
    ModeratelySuitable,
    NotRecommended,
}

impl Recommendation {
    pub fn from_score(overall_score: f64) -> Self {
        if overall_score >= 7.5 {
            Recommendation::HighlyRecommended
        } else if overall_score >= 5.0 {
            Recommendation::ModeratelySuitable
        } else {
            Recommendation::NotRecommended
        }
    }
}

impl Display for Recommendation {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Recommendation::HighlyRecommended => write!(f, "Highly Recommended"),
            Recommendation::ModeratelySuitable => write!(f, "Moderately Suitable"),
            Recommendation::NotRecommended => write!(f, "Not Recommended"),
        }
    }
}

/// Grades of the three criteria
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct SiteDetails {
    pub power: Grade,
    pub market: Grade,
    pub logistics: Grade,
}

/// One entry of a ranked result list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSite {
    /// Stable identifier within the batch, e.g. `grid-1`
    pub id: String,

    /// 1-based rank, in backend order
    pub rank: usize,

    /// Display name
    pub name: String,

    /// Overall score, 0 to 10
    pub score: f64,

    pub coordinate: Coordinate,

    pub details: SiteDetails,
}

/// Name of a radius result, with its distance from the center
pub fn radius_name(name: &str, distance_km: f64) -> String {
    format!("{name} ({distance_km:.1} km)")
}

fn id_prefix(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Radius => "radius",
        _ => "grid",
    }
}

/// Pair backend locations with their resolved names, keeping backend order.
///
/// `names` is positional: `names[i]` belongs to `locations[i]`. Radius
/// entries get their distance appended to the name.
pub fn rank_sites(kind: AnalysisKind, locations: &[ScoredLocation], names: &[String]) -> Vec<RankedSite> {
    locations
        .iter()
        .zip(names.iter())
        .enumerate()
        .map(|(i, (location, name))| {
            let name = match (kind, location.distance_from_center) {
                (AnalysisKind::Radius, Some(distance)) => radius_name(name, distance),
                _ => name.clone(),
            };

            RankedSite {
                id: format!("{}-{}", id_prefix(kind), i + 1),
                rank: i + 1,
                name,
                score: location.overall_score,
                coordinate: location.coordinate,
                details: SiteDetails {
                    power: Grade::from_score(location.sub_scores.power),
                    market: Grade::from_score(location.sub_scores.market),
                    logistics: Grade::from_score(location.sub_scores.logistics),
                },
            }
        })
        .collect()
}
