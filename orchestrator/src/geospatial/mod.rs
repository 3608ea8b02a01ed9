//! Geospatial helpers: great-circle distances and place names

#[macro_use]
pub mod macros;
pub mod haversine;
pub mod naming;

pub use svc_siting_client_rest::types::Coordinate;
