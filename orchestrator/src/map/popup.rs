//! Popup content for infrastructure and optimized result markers

use super::features::{InfrastructureFeature, LayerKey, PropertyBag};
use svc_siting_client_rest::types::ScoredLocation;

/// Fields holding a feature's name, in lookup order
pub const NAME_FIELDS: [&str; 6] = [
    "name",
    "Name",
    "port_name",
    "zone_name",
    "plant_name",
    "facility_name",
];

/// Fields holding a plant's capacity in megawatts, in lookup order
pub const CAPACITY_FIELDS: [&str; 3] = ["capacity_mw", "Capacity", "capacity"];

/// Fields holding the state a feature lies in, in lookup order
pub const STATE_FIELDS: [&str; 2] = ["State", "state"];

/// Longest text value shown in a popup
const MAX_TEXT_LEN: usize = 100;

/// Row numbering and identifier columns carried over from tabular sources
const INDEX_FIELDS: [&str; 8] = [
    "index", "id", "fid", "objectid", "sl no", "s no", "sno", "serial no",
];

/// Whether `key` only numbers or identifies a row, such as `Sl. No.`,
/// `index` or a spreadsheet's `Unnamed: 0`
fn is_index_key(key: &str) -> bool {
    let normalized: String = key
        .to_lowercase()
        .chars()
        .map(|c| if c == '_' || c == '.' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ");

    normalized.starts_with("unnamed:")
        || normalized.starts_with("serial number")
        || INDEX_FIELDS.contains(&normalized.as_str())
}

/// Content of a marker popup
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Popup {
    pub title: String,
    pub subtitle: String,

    /// Label and value pairs, in display order
    pub lines: Vec<(String, String)>,
}

impl Popup {
    /// Value of the line labelled `label`
    pub fn line(&self, label: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

/// `capacity_mw` becomes `Capacity Mw`
pub fn title_case(key: &str) -> String {
    key.replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn text_of(properties: &PropertyBag, keys: &[&str]) -> Option<String> {
    properties.first_truthy(keys).and_then(|v| v.display())
}

/// Name of a feature.
///
/// An explicit or type specific name field wins. Solar and wind plants
/// without one are described by capacity and state. Anything else is a
/// generic facility of its type.
pub fn feature_name(feature: &InfrastructureFeature) -> String {
    if let Some(name) = text_of(&feature.properties, &NAME_FIELDS) {
        return name;
    }

    let plant = match feature.layer {
        LayerKey::Solar => Some("Solar Plant"),
        LayerKey::Wind => Some("Wind Farm"),
        _ => None,
    };

    if let Some(plant) = plant {
        let capacity = text_of(&feature.properties, &CAPACITY_FIELDS)
            .map(|c| format!("{c}MW "))
            .unwrap_or_default();
        let state = text_of(&feature.properties, &STATE_FIELDS)
            .map(|s| format!(" – {s}"))
            .unwrap_or_default();
        return format!("{capacity}{plant}{state}");
    }

    let kind = feature
        .kind
        .as_deref()
        .filter(|k| !k.is_empty())
        .unwrap_or(feature.layer.as_str());
    format!("{} Facility", title_case(kind))
}

/// Popup of an infrastructure marker.
///
/// Capacity and state come first, then the remaining displayable scalars
/// in delivery order. Names, the type tag, serial numbers, falsy values,
/// objects and long texts are left out.
pub fn feature_popup(feature: &InfrastructureFeature) -> Popup {
    let mut shown: Vec<&str> = NAME_FIELDS.to_vec();
    shown.push("type");

    let mut lines = vec![];
    for key in CAPACITY_FIELDS.iter().chain(STATE_FIELDS.iter()) {
        if shown.contains(key) {
            continue;
        }
        if let Some(value) = feature.properties.truthy(key).and_then(|v| v.display()) {
            lines.push((title_case(key), value));
            shown.push(*key);
        }
    }

    for (key, value) in feature.properties.iter() {
        if shown.contains(&key)
            || is_index_key(key)
            || !value.is_truthy()
        {
            continue;
        }

        let Some(text) = value.display() else {
            continue;
        };
        if text.chars().count() > MAX_TEXT_LEN {
            continue;
        }

        lines.push((title_case(key), text));
    }

    Popup {
        title: feature_name(feature),
        subtitle: feature
            .kind
            .clone()
            .unwrap_or_else(|| "Infrastructure".to_string()),
        lines,
    }
}

/// Popup of an optimized result marker, `rank` is 1-based
pub fn optimized_popup(rank: usize, location: &ScoredLocation) -> Popup {
    let mut lines = vec![
        ("Overall Score".to_string(), location.overall_score.to_string()),
        ("Power".to_string(), location.sub_scores.power.to_string()),
        ("Market".to_string(), location.sub_scores.market.to_string()),
        (
            "Logistics".to_string(),
            location.sub_scores.logistics.to_string(),
        ),
    ];
    if let Some(name) = &location.resolved_name {
        lines.push(("Location".to_string(), name.clone()));
    }
    lines.push((
        "Coordinates".to_string(),
        format!(
            "{:.4}, {:.4}",
            location.coordinate.latitude, location.coordinate.longitude
        ),
    ));

    Popup {
        title: format!("Optimized Station {rank}"),
        subtitle: "Optimized".to_string(),
        lines,
    }
}
