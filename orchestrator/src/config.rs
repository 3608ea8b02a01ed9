//! # Config
//!
//! Define and implement config options for module

use config::{ConfigError, Environment};
use dotenv::dotenv;
use serde::Deserialize;

/// struct holding configuration options
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// base URL of the scoring backend REST API
    pub scoring_base_url: String,

    /// base URL of the reverse geocoding service
    pub geocoder_base_url: String,

    /// user agent sent to the reverse geocoding service
    pub geocoder_user_agent: String,

    /// zoom level requested from the reverse geocoding service
    pub geocoder_zoom: u8,

    /// maximum number of reverse geocoding lookups in flight
    pub geocoder_max_concurrency: usize,

    /// number of decimals coordinates are rounded to for the place name cache
    pub name_cache_precision: u32,

    /// per-call timeout for backend and geocoding requests, in milliseconds
    pub request_timeout_ms: u64,

    /// number of locations requested from a grid search
    pub grid_num_results: usize,

    /// initial radius for radius searches, in kilometers
    pub default_radius_km: f64,

    /// initial required capacity for power supply analysis, in megawatts
    pub default_required_capacity_mw: f64,

    /// latitude the map is initially centered on
    pub map_center_lat: f64,

    /// longitude the map is initially centered on
    pub map_center_lng: f64,

    /// initial map zoom level
    pub map_zoom: u8,

    /// tile URL template handed to the rendering engine
    pub tile_url: String,

    /// attribution text for the tile layer
    pub tile_attribution: String,

    /// tile server subdomains
    pub tile_subdomains: String,

    /// maximum tile zoom level
    pub tile_max_zoom: u8,

    /// path to log configuration YAML file
    pub log_config: String,
}

impl Default for Config {
    fn default() -> Self {
        log::warn!("(default) Creating Config object with default values.");
        Self::new()
    }
}

impl Config {
    /// Default values for Config
    pub fn new() -> Self {
        Config {
            scoring_base_url: String::from("http://127.0.0.1:5000/api"),
            geocoder_base_url: String::from("https://nominatim.openstreetmap.org"),
            geocoder_user_agent: String::from("svc-siting/0.1"),
            geocoder_zoom: 10,
            geocoder_max_concurrency: 2,
            name_cache_precision: 3,
            request_timeout_ms: 10_000,
            grid_num_results: 5,
            default_radius_km: 100.0,
            default_required_capacity_mw: 500.0,
            map_center_lat: 20.5937,
            map_center_lng: 78.9629,
            map_zoom: 5,
            tile_url: String::from(
                "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
            ),
            tile_attribution: String::from(
                "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>",
            ),
            tile_subdomains: String::from("abcd"),
            tile_max_zoom: 19,
            log_config: String::from("log4rs.yaml"),
        }
    }

    /// Create a new `Config` object using environment variables
    pub fn try_from_env() -> Result<Self, ConfigError> {
        // read .env file if present
        dotenv().ok();
        let default_config = Config::default();

        config::Config::builder()
            .set_default("scoring_base_url", default_config.scoring_base_url)?
            .set_default("geocoder_base_url", default_config.geocoder_base_url)?
            .set_default("geocoder_user_agent", default_config.geocoder_user_agent)?
            .set_default("geocoder_zoom", default_config.geocoder_zoom)?
            .set_default(
                "geocoder_max_concurrency",
                default_config.geocoder_max_concurrency as u64,
            )?
            .set_default("name_cache_precision", default_config.name_cache_precision)?
            .set_default("request_timeout_ms", default_config.request_timeout_ms)?
            .set_default("grid_num_results", default_config.grid_num_results as u64)?
            .set_default("default_radius_km", default_config.default_radius_km)?
            .set_default(
                "default_required_capacity_mw",
                default_config.default_required_capacity_mw,
            )?
            .set_default("map_center_lat", default_config.map_center_lat)?
            .set_default("map_center_lng", default_config.map_center_lng)?
            .set_default("map_zoom", default_config.map_zoom)?
            .set_default("tile_url", default_config.tile_url)?
            .set_default("tile_attribution", default_config.tile_attribution)?
            .set_default("tile_subdomains", default_config.tile_subdomains)?
            .set_default("tile_max_zoom", default_config.tile_max_zoom)?
            .set_default("log_config", default_config.log_config)?
            .add_source(Environment::default().separator("__"))
            .build()?
            .try_deserialize()
    }
}
