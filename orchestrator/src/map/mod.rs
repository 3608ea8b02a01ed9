//! Map surface: the rendering engine seam, infrastructure layers, overlays
//! and the controller owning the single map instance.

#[macro_use]
pub mod macros;
pub mod controller;
pub mod features;
pub mod headless;
pub mod layers;
pub mod overlays;
pub mod popup;

use crate::config::Config;
use crate::geospatial::Coordinate;
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tokio::sync::mpsc::UnboundedSender;

pub use popup::Popup;

/// Identifies the region of the screen the map is drawn into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerHandle(pub String);

impl ContainerHandle {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Marker drawn on the surface
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MarkerId(pub u64);

/// Group of markers cleared together
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct GroupId(pub u64);

/// Circle drawn on the surface
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CircleId(pub u64);

/// Registered click listener
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Center and zoom of the map
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

/// Tile source handed to the rendering engine
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayerSpec {
    /// URL template with `{s}`, `{z}`, `{x}`, `{y}` and `{r}` placeholders
    pub url_template: String,
    pub attribution: String,
    pub subdomains: String,
    pub max_zoom: u8,
}

/// Everything needed to create a map instance
#[derive(Debug, Clone, PartialEq)]
pub struct MapOptions {
    pub view: MapView,
    pub tiles: TileLayerSpec,
}

impl From<&Config> for MapOptions {
    fn from(config: &Config) -> Self {
        Self {
            view: MapView {
                center: Coordinate::new(config.map_center_lat, config.map_center_lng),
                zoom: config.map_zoom,
            },
            tiles: TileLayerSpec {
                url_template: config.tile_url.clone(),
                attribution: config.tile_attribution.clone(),
                subdomains: config.tile_subdomains.clone(),
                max_zoom: config.tile_max_zoom,
            },
        }
    }
}

/// Marker symbol, one per layer plus the overlay kinds
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IconKind {
    Demand,
    Hub,
    Solar,
    Wind,
    Renewable,
    Pinpoint,
    Optimized,
}

lazy_static! {
    static ref ICON_COLORS: HashMap<IconKind, &'static str> = HashMap::from([
        (IconKind::Demand, "#9333ea"),
        (IconKind::Hub, "#2563eb"),
        (IconKind::Solar, "#f97316"),
        (IconKind::Wind, "#0891b2"),
        (IconKind::Renewable, "#10b981"),
        (IconKind::Pinpoint, "#e11d48"),
        (IconKind::Optimized, "#fbbf24"),
    ]);
}

/// Used for any icon missing from the palette
const FALLBACK_ICON_COLOR: &str = "#6b7280";

impl IconKind {
    /// Fill colour of the icon
    pub fn color(&self) -> &'static str {
        ICON_COLORS.get(self).copied().unwrap_or(FALLBACK_ICON_COLOR)
    }
}

/// Stacking offset of the pinpoint marker
pub const PINPOINT_Z_OFFSET: i32 = 1000;

/// Stacking offset of optimized result markers
pub const OPTIMIZED_Z_OFFSET: i32 = 500;

/// A marker to draw
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub at: Coordinate,
    pub icon: IconKind,
    pub popup: Popup,
    pub z_offset: i32,
}

/// A circle to draw
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CircleSpec {
    pub center: Coordinate,

    /// Radius in meters
    pub radius_m: f64,
}

/// Errors reported by a rendering engine
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The container to draw into does not exist (yet)
    ContainerUnavailable(String),

    /// No map instance is live
    NotMounted,

    /// The marker is not on the map
    UnknownMarker(MarkerId),

    /// The layer group is not on the map
    UnknownGroup(GroupId),

    /// The circle is not on the map
    UnknownCircle(CircleId),

    /// Any other engine failure
    Engine(String),
}

impl Display for SurfaceError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            SurfaceError::ContainerUnavailable(id) => write!(f, "Container [{id}] unavailable."),
            SurfaceError::NotMounted => write!(f, "No map instance is mounted."),
            SurfaceError::UnknownMarker(id) => write!(f, "Unknown marker {}.", id.0),
            SurfaceError::UnknownGroup(id) => write!(f, "Unknown layer group {}.", id.0),
            SurfaceError::UnknownCircle(id) => write!(f, "Unknown circle {}.", id.0),
            SurfaceError::Engine(e) => write!(f, "Map engine error: {e}."),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Primitive drawing operations of a map rendering engine.
///
/// Implementations are driven from a single owner task and are never
/// shared; every call happens on that task.
pub trait MapSurface: Send {
    /// Whether the container can be drawn into right now
    fn container_ready(&self, container: &ContainerHandle) -> bool;

    /// Create the map instance inside `container`
    fn mount(&mut self, container: &ContainerHandle, options: &MapOptions)
        -> Result<(), SurfaceError>;

    fn create_layer_group(&mut self) -> Result<GroupId, SurfaceError>;

    /// Remove every marker of a group, keeping the group
    fn clear_layer_group(&mut self, group: GroupId) -> Result<(), SurfaceError>;

    /// Add a marker, to a group or directly to the map
    fn add_marker(&mut self, group: Option<GroupId>, marker: MarkerSpec)
        -> Result<MarkerId, SurfaceError>;

    fn move_marker(&mut self, id: MarkerId, to: Coordinate) -> Result<(), SurfaceError>;

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), SurfaceError>;

    /// Recenter the view, keeping the zoom
    fn pan_to(&mut self, at: Coordinate) -> Result<(), SurfaceError>;

    fn add_circle(&mut self, circle: CircleSpec) -> Result<CircleId, SurfaceError>;

    fn remove_circle(&mut self, id: CircleId) -> Result<(), SurfaceError>;

    /// Forward every click on the map to `sink`
    fn subscribe_clicks(
        &mut self,
        sink: UnboundedSender<Coordinate>,
    ) -> Result<ListenerId, SurfaceError>;

    fn unsubscribe(&mut self, id: ListenerId) -> Result<(), SurfaceError>;

    /// Release the map instance and everything drawn on it
    fn destroy(&mut self);
}
