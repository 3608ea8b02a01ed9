//! Best-effort reverse place-name lookup.
//!
//! Names are cosmetic: every failure degrades to a deterministic
//! coordinate string and is only logged.

use super::Coordinate;
use async_trait::async_trait;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};

/// Address components of a reverse geocoding answer.
///
/// Only the fields used to build a display name are kept.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Address {
    /// City name
    pub city: Option<String>,

    /// Town name, used when there is no city
    pub town: Option<String>,

    /// Village name, used when there is neither city nor town
    pub village: Option<String>,

    /// District within the state
    pub state_district: Option<String>,

    /// County, used when there is no state district
    pub county: Option<String>,

    /// State or province
    pub state: Option<String>,
}

impl Address {
    fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.town.as_deref())
            .or(self.village.as_deref())
    }

    fn district(&self) -> Option<&str> {
        self.state_district
            .as_deref()
            .or(self.county.as_deref())
    }

    fn is_empty(&self) -> bool {
        self.locality().is_none() && self.district().is_none() && self.state.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    #[serde(default)]
    address: Option<Address>,
}

/// Reasons a reverse lookup produced no address
#[derive(Debug, Clone, PartialEq)]
pub enum GeocodeError {
    /// The request never produced a response
    Transport(String),

    /// The service answered with a non-success status code
    Status(u16),

    /// The response body could not be decoded
    Decode(String),

    /// The response carried no usable address components
    Empty,
}

impl Display for GeocodeError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            GeocodeError::Transport(e) => write!(f, "Geocoding transport error: {e}."),
            GeocodeError::Status(code) => write!(f, "Geocoding service returned {code}."),
            GeocodeError::Decode(e) => write!(f, "Could not decode geocoding response: {e}."),
            GeocodeError::Empty => write!(f, "Geocoding response had no address."),
        }
    }
}

impl std::error::Error for GeocodeError {}

/// A reverse geocoding service
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Look up the address components at a coordinate
    async fn reverse(&self, at: &Coordinate) -> Result<Address, GeocodeError>;
}

/// [`ReverseGeocoder`] backed by a Nominatim compatible HTTP API
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: reqwest::Client,
    base_url: String,
    zoom: u8,
}

impl NominatimGeocoder {
    /// Create a new geocoder. Nominatim requires an identifying user agent.
    pub fn new(
        base_url: &str,
        user_agent: &str,
        zoom: u8,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .build()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            zoom,
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn reverse(&self, at: &Coordinate) -> Result<Address, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let query = [
            ("format", "json".to_string()),
            ("lat", at.latitude.to_string()),
            ("lon", at.longitude.to_string()),
            ("zoom", self.zoom.to_string()),
            ("addressdetails", "1".to_string()),
        ];

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        let parsed: ReverseResponse =
            serde_json::from_slice(&body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

        match parsed.address {
            Some(address) if !address.is_empty() => Ok(address),
            _ => Err(GeocodeError::Empty),
        }
    }
}

/// Deterministic name used whenever no better name is available
pub fn fallback_name(at: &Coordinate) -> String {
    format!("Location {:.2}°N, {:.2}°E", at.latitude, at.longitude)
}

/// Build a display name from address components.
///
/// Order: city + state, district + state, state alone, coordinate string.
pub fn name_from_address(address: &Address, at: &Coordinate) -> String {
    match (address.locality(), address.district(), address.state.as_deref()) {
        (Some(city), _, Some(state)) => format!("{city}, {state}"),
        (None, Some(district), Some(state)) => format!("{district}, {state}"),
        (_, _, Some(state)) => state.to_string(),
        _ => fallback_name(at),
    }
}

/// Most decimals a cache key keeps; finer keys would overflow the scale
pub const MAX_CACHE_PRECISION: u32 = 10;

type CacheKey = (OrderedFloat<f64>, OrderedFloat<f64>);

fn cache_key(at: &Coordinate, precision: u32) -> CacheKey {
    let scale = 10f64.powi(precision.min(MAX_CACHE_PRECISION) as i32);
    (
        OrderedFloat((at.latitude * scale).round() / scale),
        OrderedFloat((at.longitude * scale).round() / scale),
    )
}

/// Resolves coordinates to display names with caching and fallback
pub struct LocationNameResolver {
    geocoder: Arc<dyn ReverseGeocoder>,
    cache: Mutex<HashMap<CacheKey, String>>,
    precision: u32,
    permits: Semaphore,
}

impl std::fmt::Debug for LocationNameResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("LocationNameResolver")
            .field("precision", &self.precision)
            .finish()
    }
}

impl LocationNameResolver {
    /// Create a new resolver.
    ///
    /// `precision` is the number of decimals coordinates are rounded to
    /// before looking up the cache. `max_concurrency` bounds the lookups
    /// in flight, the public services are rate limited.
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>, precision: u32, max_concurrency: usize) -> Self {
        if precision > MAX_CACHE_PRECISION {
            geo_warn!(
                "(new) name cache precision {} too fine, using {}.",
                precision,
                MAX_CACHE_PRECISION
            );
        }

        Self {
            geocoder,
            cache: Mutex::new(HashMap::new()),
            precision: precision.min(MAX_CACHE_PRECISION),
            permits: Semaphore::new(max_concurrency.max(1)),
        }
    }

    /// Resolve a display name. Never fails.
    pub async fn resolve(&self, at: &Coordinate) -> String {
        let key = cache_key(at, self.precision);
        if let Some(name) = self.cache.lock().await.get(&key) {
            geo_debug!("(resolve) cache hit for {:?}.", key);
            return name.clone();
        }

        let Ok(_permit) = self.permits.acquire().await else {
            geo_warn!("(resolve) lookup permits closed, using fallback name.");
            return fallback_name(at);
        };

        match self.geocoder.reverse(at).await {
            Ok(address) => {
                let name = name_from_address(&address, at);
                self.cache.lock().await.insert(key, name.clone());
                name
            }
            Err(e) => {
                geo_warn!(
                    "(resolve) could not resolve ({}, {}): {}",
                    at.latitude,
                    at.longitude,
                    e
                );
                fallback_name(at)
            }
        }
    }

    /// Number of cached names
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::FakeGeocoder;

    fn address(city: Option<&str>, district: Option<&str>, state: Option<&str>) -> Address {
        Address {
            city: city.map(String::from),
            state_district: district.map(String::from),
            state: state.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_name_format() {
        let at = Coordinate::new(19.0760, 72.8777);
        assert_eq!(fallback_name(&at), "Location 19.08°N, 72.88°E");
    }

    #[test]
    fn test_name_fallback_chain() {
        let at = Coordinate::new(19.0760, 72.8777);

        let full = address(Some("Mumbai"), Some("Mumbai Suburban"), Some("Maharashtra"));
        assert_eq!(name_from_address(&full, &at), "Mumbai, Maharashtra");

        let district = address(None, Some("Kutch"), Some("Gujarat"));
        assert_eq!(name_from_address(&district, &at), "Kutch, Gujarat");

        let state = address(None, None, Some("Rajasthan"));
        assert_eq!(name_from_address(&state, &at), "Rajasthan");

        let city_only = address(Some("Nowhere"), None, None);
        assert_eq!(name_from_address(&city_only, &at), "Location 19.08°N, 72.88°E");
    }

    #[test]
    fn test_town_and_county_substitute() {
        let at = Coordinate::new(22.0, 70.0);
        let town = Address {
            town: Some("Bhuj".to_string()),
            state: Some("Gujarat".to_string()),
            ..Default::default()
        };
        assert_eq!(name_from_address(&town, &at), "Bhuj, Gujarat");

        let county = Address {
            county: Some("Kachchh".to_string()),
            state: Some("Gujarat".to_string()),
            ..Default::default()
        };
        assert_eq!(name_from_address(&county, &at), "Kachchh, Gujarat");
    }

    #[test]
    fn test_reverse_response_without_address() {
        let parsed: ReverseResponse = serde_json::from_str(r#"{"error": "Unable to geocode"}"#).unwrap();
        assert!(parsed.address.is_none());
    }

    #[tokio::test]
    async fn test_forced_failure_returns_fallback() {
        crate::get_log_handle().await;
        ut_info!("(test_forced_failure_returns_fallback) Start.");

        let geocoder = Arc::new(FakeGeocoder::failing());
        let resolver = LocationNameResolver::new(geocoder.clone(), 3, 2);

        let name = resolver.resolve(&Coordinate::new(19.0760, 72.8777)).await;
        assert_eq!(name, "Location 19.08°N, 72.88°E");
        assert_eq!(resolver.cached().await, 0);
        assert_eq!(geocoder.calls(), 1);

        ut_info!("(test_forced_failure_returns_fallback) Success.");
    }

    #[tokio::test]
    async fn test_cache_avoids_duplicate_lookups() {
        let geocoder = Arc::new(FakeGeocoder::named("Mumbai", "Maharashtra"));
        let resolver = LocationNameResolver::new(geocoder.clone(), 3, 2);

        let first = resolver.resolve(&Coordinate::new(19.0760, 72.8777)).await;
        // rounds to the same key at three decimals
        let second = resolver.resolve(&Coordinate::new(19.07601, 72.87769)).await;

        assert_eq!(first, "Mumbai, Maharashtra");
        assert_eq!(second, first);
        assert_eq!(geocoder.calls(), 1);
        assert_eq!(resolver.cached().await, 1);

        resolver.resolve(&Coordinate::new(19.1, 72.9)).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_retried_later() {
        let geocoder = Arc::new(FakeGeocoder::failing());
        let resolver = LocationNameResolver::new(geocoder.clone(), 3, 1);
        let at = Coordinate::new(12.0, 77.0);

        resolver.resolve(&at).await;
        resolver.resolve(&at).await;
        assert_eq!(geocoder.calls(), 2);
    }

    #[tokio::test]
    async fn test_excessive_precision_is_clamped() {
        let geocoder = Arc::new(FakeGeocoder::named("Mumbai", "Maharashtra"));
        let resolver = LocationNameResolver::new(geocoder.clone(), 400, 2);
        assert_eq!(resolver.precision, MAX_CACHE_PRECISION);

        resolver.resolve(&Coordinate::new(19.0760, 72.8777)).await;
        resolver.resolve(&Coordinate::new(28.7041, 77.1025)).await;
        assert_eq!(geocoder.calls(), 2);
        assert_eq!(resolver.cached().await, 2);

        let (lat, lon) = cache_key(&Coordinate::new(19.0760, 72.8777), 400);
        assert!(lat.is_finite() && lon.is_finite());
    }

    #[test]
    fn test_cache_key_rounding() {
        assert_eq!(
            cache_key(&Coordinate::new(19.07604, 72.87771), 3),
            cache_key(&Coordinate::new(19.0760, 72.8777), 3)
        );
        assert_ne!(
            cache_key(&Coordinate::new(19.0770, 72.8777), 3),
            cache_key(&Coordinate::new(19.0760, 72.8777), 3)
        );
    }
}
