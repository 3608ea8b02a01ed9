//! Static infrastructure corpus loaded from the scoring backend

use crate::geospatial::Coordinate;
use geojson::{FeatureCollection, Value as GeometryValue};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use svc_siting_client_rest::types::InitialMapData;

/// Display category of a feature
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKey {
    Demand,
    Hub,
    Solar,
    Wind,
    /// Renewable plant that is neither solar nor wind
    Renewable,
}

impl LayerKey {
    pub const ALL: [LayerKey; 5] = [
        LayerKey::Demand,
        LayerKey::Hub,
        LayerKey::Solar,
        LayerKey::Wind,
        LayerKey::Renewable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKey::Demand => "demand",
            LayerKey::Hub => "hub",
            LayerKey::Solar => "solar",
            LayerKey::Wind => "wind",
            LayerKey::Renewable => "renewable",
        }
    }
}

impl Display for LayerKey {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Collection a feature was delivered in
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SourceCollection {
    Renewables,
    DemandCenters,
    Hubs,
}

/// Display-safe property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
    /// Objects and arrays, never displayed
    Opaque,
}

impl From<&JsonValue> for PropertyValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::String(s) => PropertyValue::Text(s.clone()),
            JsonValue::Number(n) => n
                .as_f64()
                .map(PropertyValue::Number)
                .unwrap_or(PropertyValue::Opaque),
            JsonValue::Bool(b) => PropertyValue::Bool(*b),
            JsonValue::Null => PropertyValue::Null,
            JsonValue::Array(_) | JsonValue::Object(_) => PropertyValue::Opaque,
        }
    }
}

impl PropertyValue {
    /// Empty text, zero, false and null count as absent
    pub fn is_truthy(&self) -> bool {
        match self {
            PropertyValue::Text(s) => !s.is_empty(),
            PropertyValue::Number(n) => *n != 0.0 && !n.is_nan(),
            PropertyValue::Bool(b) => *b,
            PropertyValue::Null => false,
            PropertyValue::Opaque => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text shown in a popup, `None` for values that are never displayed
    pub fn display(&self) -> Option<String> {
        match self {
            PropertyValue::Text(s) => Some(s.clone()),
            PropertyValue::Number(n) => Some(n.to_string()),
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Null | PropertyValue::Opaque => None,
        }
    }
}

/// Properties of a feature, in delivery order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyBag(Vec<(String, PropertyValue)>);

impl PropertyBag {
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The value of `key` if it is present and truthy
    pub fn truthy(&self, key: &str) -> Option<&PropertyValue> {
        self.get(key).filter(|v| v.is_truthy())
    }

    /// First truthy value among `keys`
    pub fn first_truthy(&self, keys: &[&str]) -> Option<&PropertyValue> {
        keys.iter().find_map(|key| self.truthy(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One static infrastructure record
#[derive(Debug, Clone, PartialEq)]
pub struct InfrastructureFeature {
    pub coordinate: Coordinate,
    pub layer: LayerKey,
    pub source: SourceCollection,

    /// The `type` property, when present
    pub kind: Option<String>,

    pub properties: PropertyBag,
}

/// Pick the layer of a feature.
///
/// Renewables are split by their `type` property, not by collection.
pub fn classify(source: SourceCollection, kind: Option<&str>) -> LayerKey {
    match source {
        SourceCollection::DemandCenters => LayerKey::Demand,
        SourceCollection::Hubs => LayerKey::Hub,
        SourceCollection::Renewables => match kind.map(|k| k.trim().to_ascii_lowercase()) {
            Some(k) if k == "solar" => LayerKey::Solar,
            Some(k) if k == "wind" => LayerKey::Wind,
            _ => LayerKey::Renewable,
        },
    }
}

/// The immutable feature corpus
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCorpus {
    features: Vec<InfrastructureFeature>,
}

impl FeatureCorpus {
    pub fn new(features: Vec<InfrastructureFeature>) -> Self {
        Self { features }
    }

    /// Build the corpus from the three collections of the backend.
    /// Features without a point geometry are skipped.
    pub fn from_map_data(data: &InitialMapData) -> Self {
        let mut features = vec![];
        for (source, collection) in [
            (SourceCollection::Renewables, &data.renewables),
            (SourceCollection::DemandCenters, &data.demand_centers),
            (SourceCollection::Hubs, &data.hubs),
        ] {
            features.extend(collect(source, collection));
        }

        map_info!("(from_map_data) corpus holds {} features.", features.len());
        Self { features }
    }

    pub fn features(&self) -> &[InfrastructureFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of features in `layer`
    pub fn count(&self, layer: LayerKey) -> usize {
        self.features.iter().filter(|f| f.layer == layer).count()
    }
}

fn collect(source: SourceCollection, collection: &FeatureCollection) -> Vec<InfrastructureFeature> {
    let mut features = vec![];
    for (index, feature) in collection.features.iter().enumerate() {
        let point = feature.geometry.as_ref().and_then(|g| match &g.value {
            GeometryValue::Point(position) if position.len() >= 2 => {
                // GeoJSON positions are [longitude, latitude]
                Some(Coordinate::new(position[1], position[0]))
            }
            _ => None,
        });

        let Some(coordinate) = point else {
            map_warn!(
                "(collect) skipping {:?} feature {} without a point geometry.",
                source,
                index
            );
            continue;
        };

        let properties: PropertyBag = feature
            .properties
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), PropertyValue::from(v)))
            .collect();
        let kind = properties
            .get("type")
            .and_then(|v| v.as_text())
            .map(String::from);

        features.push(InfrastructureFeature {
            coordinate,
            layer: classify(source, kind.as_deref()),
            source,
            kind,
            properties,
        });
    }

    features
}
