//! Owner of the single map instance.
//!
//! The controller is the only holder of the rendering engine. It creates
//! the instance at most once per mount, forwards clicks, composes the
//! layer and overlay managers, and releases everything on teardown.

use super::features::{FeatureCorpus, LayerKey};
use super::layers::{LayerVisibilityReconciler, VisibilityFlags};
use super::overlays::PinpointAndOverlayManager;
use super::{ContainerHandle, ListenerId, MapOptions, MapSurface, SurfaceError};
use crate::geospatial::Coordinate;
use std::sync::Arc;
use std::time::Duration;
use svc_siting_client_rest::types::ScoredLocation;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Result of an initialization attempt
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// A new map instance was created
    Created,

    /// An instance is already live; nothing was done
    AlreadyLive,

    /// The container is not available yet; try again later
    ContainerUnavailable,
}

#[derive(Debug)]
struct LiveMap {
    container: ContainerHandle,
    listener: ListenerId,
    clicks: UnboundedReceiver<Coordinate>,
}

/// Owns the map instance and everything drawn on it
pub struct MapSurfaceController {
    surface: Box<dyn MapSurface>,
    options: MapOptions,
    live: Option<LiveMap>,
    layers: LayerVisibilityReconciler,
    overlays: PinpointAndOverlayManager,
}

impl std::fmt::Debug for MapSurfaceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSurfaceController")
            .field("options", &self.options)
            .field("live", &self.live)
            .field("layers", &self.layers)
            .field("overlays", &self.overlays)
            .finish()
    }
}

impl MapSurfaceController {
    pub fn new(surface: Box<dyn MapSurface>, options: MapOptions, flags: VisibilityFlags) -> Self {
        Self {
            surface,
            options,
            live: None,
            layers: LayerVisibilityReconciler::new(flags),
            overlays: PinpointAndOverlayManager::new(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    pub fn layers(&self) -> &LayerVisibilityReconciler {
        &self.layers
    }

    pub fn overlays(&self) -> &PinpointAndOverlayManager {
        &self.overlays
    }

    /// Create the map instance in `container`.
    ///
    /// Calling it again while an instance is live does nothing. When the
    /// container is not available the call is skipped and the caller is
    /// expected to retry.
    pub fn initialize(&mut self, container: &ContainerHandle) -> Result<InitOutcome, SurfaceError> {
        if let Some(live) = &self.live {
            map_debug!(
                "(initialize) map already live in [{}], skipping.",
                live.container.0
            );
            return Ok(InitOutcome::AlreadyLive);
        }

        if !self.surface.container_ready(container) {
            map_warn!("(initialize) container [{}] not available yet.", container.0);
            return Ok(InitOutcome::ContainerUnavailable);
        }

        self.surface.mount(container, &self.options)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let listener = match self.surface.subscribe_clicks(tx) {
            Ok(listener) => listener,
            Err(e) => {
                map_error!("(initialize) could not listen for clicks: {}", e);
                self.surface.destroy();
                return Err(e);
            }
        };

        self.live = Some(LiveMap {
            container: container.clone(),
            listener,
            clicks: rx,
        });

        // corpus and flags outlive instances
        let drawn = self.layers.reconcile(self.surface.as_mut())?;
        map_info!(
            "(initialize) map created in [{}] with {} infrastructure markers.",
            container.0,
            drawn
        );
        Ok(InitOutcome::Created)
    }

    /// Call [`Self::initialize`] until the container shows up, at most
    /// `attempts` times, sleeping `delay` between attempts.
    pub async fn initialize_with_retry(
        &mut self,
        container: &ContainerHandle,
        attempts: u32,
        delay: Duration,
    ) -> Result<InitOutcome, SurfaceError> {
        let mut tries = 0;
        loop {
            match self.initialize(container)? {
                InitOutcome::ContainerUnavailable if tries + 1 < attempts => {
                    map_info!(
                        "(initialize_with_retry) container not ready at attempt {}, retry in {} ms...",
                        tries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    tries += 1;
                }
                InitOutcome::ContainerUnavailable => {
                    map_error!(
                        "(initialize_with_retry) container [{}] still unavailable after {} attempts.",
                        container.0,
                        attempts
                    );
                    return Err(SurfaceError::ContainerUnavailable(container.0.clone()));
                }
                outcome => return Ok(outcome),
            }
        }
    }

    /// Wait for the next click. `None` when no instance is live or the
    /// engine stopped sending.
    pub async fn next_click(&mut self) -> Option<Coordinate> {
        match self.live.as_mut() {
            Some(live) => live.clicks.recv().await,
            None => None,
        }
    }

    /// The next click if one is already waiting
    pub fn try_next_click(&mut self) -> Option<Coordinate> {
        self.live
            .as_mut()
            .and_then(|live| live.clicks.try_recv().ok())
    }

    /// Replace the infrastructure corpus
    pub fn set_corpus(&mut self, corpus: Arc<FeatureCorpus>) -> Result<usize, SurfaceError> {
        let surface: Option<&mut dyn MapSurface> = match self.live {
            Some(_) => Some(self.surface.as_mut()),
            None => None,
        };
        self.layers.set_corpus(corpus, surface)
    }

    /// Replace every layer visibility flag
    pub fn set_visibility(&mut self, flags: VisibilityFlags) -> Result<usize, SurfaceError> {
        let surface: Option<&mut dyn MapSurface> = match self.live {
            Some(_) => Some(self.surface.as_mut()),
            None => None,
        };
        self.layers.set_flags(flags, surface)
    }

    /// Show or hide one infrastructure layer
    pub fn set_layer_visible(&mut self, key: LayerKey, visible: bool) -> Result<usize, SurfaceError> {
        let surface: Option<&mut dyn MapSurface> = match self.live {
            Some(_) => Some(self.surface.as_mut()),
            None => None,
        };
        self.layers.set_visible(key, visible, surface)
    }

    /// Flip one infrastructure layer, returning its new visibility
    pub fn toggle_layer(&mut self, key: LayerKey) -> Result<bool, SurfaceError> {
        let visible = !self.layers.flags().is_visible(key);
        self.set_layer_visible(key, visible)?;
        Ok(visible)
    }

    pub fn set_pinpoint(&mut self, at: Option<Coordinate>) -> Result<(), SurfaceError> {
        let surface = match self.live {
            Some(_) => self.surface.as_mut(),
            None => return Err(SurfaceError::NotMounted),
        };
        self.overlays.set_pinpoint(surface, at)
    }

    pub fn set_optimized_locations(
        &mut self,
        locations: &[ScoredLocation],
    ) -> Result<(), SurfaceError> {
        let surface = match self.live {
            Some(_) => self.surface.as_mut(),
            None => return Err(SurfaceError::NotMounted),
        };
        self.overlays.set_optimized_locations(surface, locations)
    }

    pub fn set_radius_overlay(
        &mut self,
        circle: Option<(Coordinate, f64)>,
    ) -> Result<(), SurfaceError> {
        let surface = match self.live {
            Some(_) => self.surface.as_mut(),
            None => return Err(SurfaceError::NotMounted),
        };
        self.overlays.set_radius_overlay(surface, circle)
    }

    /// Release the map instance and detach all listeners.
    /// Returns false when there was nothing to release.
    pub fn teardown(&mut self) -> bool {
        let Some(live) = self.live.take() else {
            return false;
        };

        if let Err(e) = self.surface.unsubscribe(live.listener) {
            map_warn!("(teardown) could not detach click listener: {}", e);
        }
        self.surface.destroy();
        self.layers.detach();
        self.overlays.detach();

        map_info!("(teardown) map in [{}] released.", live.container.0);
        true
    }
}

impl Drop for MapSurfaceController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::headless::{HeadlessProbe, HeadlessSurface};
    use crate::map::IconKind;
    use crate::test_util::{sample_map_data, scored};

    fn controller(surface: HeadlessSurface) -> (MapSurfaceController, HeadlessProbe) {
        let probe = surface.probe();
        let controller = MapSurfaceController::new(
            Box::new(surface),
            MapOptions::from(&crate::Config::new()),
            VisibilityFlags::default(),
        );
        (controller, probe)
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        crate::get_log_handle().await;
        ut_info!("(test_initialize_is_idempotent) Start.");

        let (mut controller, probe) = controller(HeadlessSurface::new());
        let container = ContainerHandle::new("map-container");

        assert_eq!(controller.initialize(&container), Ok(InitOutcome::Created));
        assert_eq!(controller.initialize(&container), Ok(InitOutcome::AlreadyLive));
        assert_eq!(controller.initialize(&container), Ok(InitOutcome::AlreadyLive));
        assert_eq!(probe.mounts(), 1);
        assert_eq!(probe.listeners(), 1);

        ut_info!("(test_initialize_is_idempotent) Success.");
    }

    #[tokio::test]
    async fn test_initialize_skipped_without_container() {
        let (mut controller, probe) = controller(HeadlessSurface::without_container());
        let container = ContainerHandle::new("map-container");

        assert_eq!(
            controller.initialize(&container),
            Ok(InitOutcome::ContainerUnavailable)
        );
        assert!(!controller.is_live());
        assert_eq!(probe.mounts(), 0);
    }

    #[tokio::test]
    async fn test_initialize_with_retry_waits_for_container() {
        let (mut controller, probe) = controller(HeadlessSurface::without_container());
        let container = ContainerHandle::new("map-container");

        let ready = probe.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            ready.set_container_ready(true);
        });

        let outcome = controller
            .initialize_with_retry(&container, 20, Duration::from_millis(10))
            .await;
        assert_eq!(outcome, Ok(InitOutcome::Created));
        assert_eq!(probe.mounts(), 1);
    }

    #[tokio::test]
    async fn test_initialize_with_retry_gives_up() {
        let (mut controller, _) = controller(HeadlessSurface::without_container());
        let container = ContainerHandle::new("map-container");

        let outcome = controller
            .initialize_with_retry(&container, 3, Duration::from_millis(1))
            .await;
        assert_eq!(
            outcome,
            Err(SurfaceError::ContainerUnavailable("map-container".to_string()))
        );
    }

    #[tokio::test]
    async fn test_clicks_are_forwarded() {
        let (mut controller, probe) = controller(HeadlessSurface::new());
        controller
            .initialize(&ContainerHandle::new("map-container"))
            .unwrap();

        probe.click(Coordinate::new(21.0, 72.0));
        probe.click(Coordinate::new(22.0, 73.0));
        assert_eq!(controller.next_click().await, Some(Coordinate::new(21.0, 72.0)));
        assert_eq!(controller.try_next_click(), Some(Coordinate::new(22.0, 73.0)));
        assert_eq!(controller.try_next_click(), None);
    }

    #[tokio::test]
    async fn test_teardown_runs_once() {
        let (mut controller, probe) = controller(HeadlessSurface::new());
        controller
            .initialize(&ContainerHandle::new("map-container"))
            .unwrap();
        controller
            .set_pinpoint(Some(Coordinate::new(21.0, 72.0)))
            .unwrap();

        assert!(controller.teardown());
        assert!(!controller.teardown());
        assert_eq!(probe.destroys(), 1);
        assert_eq!(probe.listeners(), 0);
        assert_eq!(probe.marker_count(), 0);
        assert!(!controller.overlays().has_pinpoint());
        assert_eq!(controller.next_click().await, None);

        drop(controller);
        assert_eq!(probe.destroys(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_instance() {
        let (mut controller, probe) = controller(HeadlessSurface::new());
        controller
            .initialize(&ContainerHandle::new("map-container"))
            .unwrap();

        drop(controller);
        assert_eq!(probe.destroys(), 1);
        assert!(!probe.is_mounted());
    }

    #[tokio::test]
    async fn test_remount_redraws_layers() {
        let (mut controller, probe) = controller(HeadlessSurface::new());
        let container = ContainerHandle::new("map-container");
        let corpus = Arc::new(FeatureCorpus::from_map_data(&sample_map_data()));

        // the corpus can arrive before the map exists
        assert_eq!(controller.set_corpus(corpus), Ok(0));
        controller.initialize(&container).unwrap();
        assert_eq!(probe.marker_count(), 5);

        controller.teardown();
        assert_eq!(controller.initialize(&container), Ok(InitOutcome::Created));
        assert_eq!(probe.mounts(), 2);
        assert_eq!(probe.marker_count(), 5);
    }

    #[tokio::test]
    async fn test_layer_toggle_and_overlays() {
        let (mut controller, probe) = controller(HeadlessSurface::new());
        controller
            .initialize(&ContainerHandle::new("map-container"))
            .unwrap();
        controller
            .set_corpus(Arc::new(FeatureCorpus::from_map_data(&sample_map_data())))
            .unwrap();

        assert_eq!(controller.toggle_layer(LayerKey::Solar), Ok(true));
        assert_eq!(probe.markers_with(IconKind::Solar).len(), 2);
        assert_eq!(controller.toggle_layer(LayerKey::Solar), Ok(false));
        assert_eq!(probe.markers_with(IconKind::Solar).len(), 0);

        controller
            .set_optimized_locations(&[scored(20.0, 72.0, 9.0)])
            .unwrap();
        controller
            .set_radius_overlay(Some((Coordinate::new(20.0, 72.0), 25.0)))
            .unwrap();
        assert_eq!(probe.markers_with(IconKind::Optimized).len(), 1);
        assert_eq!(probe.circles().len(), 1);
        // infrastructure untouched by overlays
        assert_eq!(controller.layers().total_drawn(), 5);
    }

    #[test]
    fn test_overlays_need_live_map() {
        let (mut controller, _) = controller(HeadlessSurface::new());
        assert_eq!(
            controller.set_pinpoint(Some(Coordinate::new(1.0, 1.0))),
            Err(SurfaceError::NotMounted)
        );
    }
}
