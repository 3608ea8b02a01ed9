//! Overlays not derived from the corpus: the pinpoint, the optimized
//! result markers and the radius circle.

use super::popup::{optimized_popup, Popup};
use super::{
    CircleId, CircleSpec, IconKind, MapSurface, MarkerId, MarkerSpec, SurfaceError,
    OPTIMIZED_Z_OFFSET, PINPOINT_Z_OFFSET,
};
use crate::geospatial::Coordinate;
use svc_siting_client_rest::types::ScoredLocation;

/// Remove a marker, treating one the engine no longer knows as removed
fn remove_marker(surface: &mut dyn MapSurface, id: MarkerId) -> Result<(), SurfaceError> {
    match surface.remove_marker(id) {
        Ok(()) | Err(SurfaceError::UnknownMarker(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Owns the overlay markers and circle drawn on the map
#[derive(Debug, Default)]
pub struct PinpointAndOverlayManager {
    pinpoint: Option<MarkerId>,
    optimized: Vec<MarkerId>,
    circle: Option<CircleId>,
}

impl PinpointAndOverlayManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pinpoint(&self) -> bool {
        self.pinpoint.is_some()
    }

    pub fn optimized_count(&self) -> usize {
        self.optimized.len()
    }

    pub fn has_circle(&self) -> bool {
        self.circle.is_some()
    }

    /// Place, move or remove the single pinpoint marker.
    /// The view is recentered on a placed pinpoint.
    pub fn set_pinpoint(
        &mut self,
        surface: &mut dyn MapSurface,
        at: Option<Coordinate>,
    ) -> Result<(), SurfaceError> {
        let Some(at) = at else {
            if let Some(id) = self.pinpoint {
                remove_marker(surface, id)?;
                self.pinpoint = None;
            }
            return Ok(());
        };

        match self.pinpoint {
            Some(id) => surface.move_marker(id, at)?,
            None => {
                let id = surface.add_marker(
                    None,
                    MarkerSpec {
                        at,
                        icon: IconKind::Pinpoint,
                        popup: Popup {
                            title: "Selected Location".to_string(),
                            subtitle: format!("{:.4}, {:.4}", at.latitude, at.longitude),
                            lines: vec![],
                        },
                        z_offset: PINPOINT_Z_OFFSET,
                    },
                )?;
                self.pinpoint = Some(id);
            }
        }

        surface.pan_to(at)
    }

    /// Replace the optimized markers with one per location, ranked in order
    pub fn set_optimized_locations(
        &mut self,
        surface: &mut dyn MapSurface,
        locations: &[ScoredLocation],
    ) -> Result<(), SurfaceError> {
        let mut failure = None;
        let mut remaining = vec![];
        for id in std::mem::take(&mut self.optimized) {
            if let Err(e) = remove_marker(surface, id) {
                remaining.push(id);
                failure.get_or_insert(e);
            }
        }
        self.optimized = remaining;
        if let Some(e) = failure {
            map_error!(
                "(set_optimized_locations) {} stale marker(s) could not be removed: {}",
                self.optimized.len(),
                e
            );
            return Err(e);
        }

        for (index, location) in locations.iter().enumerate() {
            let id = surface.add_marker(
                None,
                MarkerSpec {
                    at: location.coordinate,
                    icon: IconKind::Optimized,
                    popup: optimized_popup(index + 1, location),
                    z_offset: OPTIMIZED_Z_OFFSET,
                },
            )?;
            self.optimized.push(id);
        }

        map_debug!(
            "(set_optimized_locations) showing {} optimized location(s).",
            self.optimized.len()
        );
        Ok(())
    }

    /// Draw the search circle, or remove it when `circle` is `None`.
    /// `circle` is the center and the radius in kilometers.
    pub fn set_radius_overlay(
        &mut self,
        surface: &mut dyn MapSurface,
        circle: Option<(Coordinate, f64)>,
    ) -> Result<(), SurfaceError> {
        if let Some(id) = self.circle {
            match surface.remove_circle(id) {
                Ok(()) | Err(SurfaceError::UnknownCircle(_)) => self.circle = None,
                Err(e) => return Err(e),
            }
        }

        if let Some((center, radius_km)) = circle {
            let id = surface.add_circle(CircleSpec {
                center,
                radius_m: radius_km * 1000.0,
            })?;
            self.circle = Some(id);
        }

        Ok(())
    }

    /// Forget the overlays of a released map instance
    pub fn detach(&mut self) {
        self.pinpoint = None;
        self.optimized.clear();
        self.circle = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::headless::HeadlessSurface;
    use crate::map::{ContainerHandle, MapOptions};
    use crate::test_util::scored;

    fn mounted() -> HeadlessSurface {
        let mut surface = HeadlessSurface::new();
        surface
            .mount(
                &ContainerHandle::new("map"),
                &MapOptions::from(&crate::Config::new()),
            )
            .unwrap();
        surface
    }

    #[test]
    fn test_single_pinpoint() {
        let mut surface = mounted();
        let probe = surface.probe();
        let mut overlays = PinpointAndOverlayManager::new();
        let a = Coordinate::new(19.0760, 72.8777);
        let b = Coordinate::new(28.7041, 77.1025);

        overlays.set_pinpoint(&mut surface, Some(a)).unwrap();
        overlays.set_pinpoint(&mut surface, Some(b)).unwrap();

        let pins = probe.markers_with(IconKind::Pinpoint);
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].spec.at, b);
        assert_eq!(pins[0].spec.z_offset, PINPOINT_Z_OFFSET);
        assert_eq!(probe.center(), Some(b));

        overlays.set_pinpoint(&mut surface, None).unwrap();
        assert!(probe.markers_with(IconKind::Pinpoint).is_empty());
        assert!(!overlays.has_pinpoint());
        // clearing twice is harmless
        overlays.set_pinpoint(&mut surface, None).unwrap();
    }

    #[test]
    fn test_optimized_markers_replaced() {
        let mut surface = mounted();
        let probe = surface.probe();
        let mut overlays = PinpointAndOverlayManager::new();

        let five: Vec<ScoredLocation> = (0..5).map(|i| scored(20.0 + i as f64, 72.0, 9.0)).collect();
        let two: Vec<ScoredLocation> = (0..2).map(|i| scored(10.0 + i as f64, 76.0, 7.0)).collect();

        overlays.set_optimized_locations(&mut surface, &five).unwrap();
        assert_eq!(probe.markers_with(IconKind::Optimized).len(), 5);

        overlays.set_optimized_locations(&mut surface, &two).unwrap();
        let markers = probe.markers_with(IconKind::Optimized);
        assert_eq!(markers.len(), 2);
        assert_eq!(overlays.optimized_count(), 2);
        assert!(markers
            .iter()
            .any(|m| m.spec.popup.title == "Optimized Station 2"));
        assert!(markers.iter().all(|m| m.spec.z_offset == OPTIMIZED_Z_OFFSET));

        overlays.set_optimized_locations(&mut surface, &[]).unwrap();
        assert!(probe.markers_with(IconKind::Optimized).is_empty());
    }

    #[test]
    fn test_stuck_optimized_marker_stays_tracked() {
        let mut surface = mounted();
        let probe = surface.probe();
        let mut overlays = PinpointAndOverlayManager::new();

        let three: Vec<ScoredLocation> = (0..3).map(|i| scored(20.0 + i as f64, 72.0, 9.0)).collect();
        overlays.set_optimized_locations(&mut surface, &three).unwrap();
        let stuck = probe.markers_with(IconKind::Optimized)[1].id;
        probe.set_marker_stuck(stuck, true);

        let one = vec![scored(11.0, 76.0, 7.0)];
        assert!(matches!(
            overlays.set_optimized_locations(&mut surface, &one),
            Err(SurfaceError::Engine(_))
        ));
        // the other two went away, the stuck one is still tracked
        let left = probe.markers_with(IconKind::Optimized);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, stuck);
        assert_eq!(overlays.optimized_count(), 1);

        probe.set_marker_stuck(stuck, false);
        overlays.set_optimized_locations(&mut surface, &one).unwrap();
        let markers = probe.markers_with(IconKind::Optimized);
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].spec.at, one[0].coordinate);
        assert_eq!(overlays.optimized_count(), 1);
    }

    #[test]
    fn test_marker_removed_elsewhere_is_forgotten() {
        let mut surface = mounted();
        let probe = surface.probe();
        let mut overlays = PinpointAndOverlayManager::new();

        overlays
            .set_optimized_locations(&mut surface, &[scored(2.0, 2.0, 5.0)])
            .unwrap();
        let id = probe.markers_with(IconKind::Optimized)[0].id;
        surface.remove_marker(id).unwrap();

        overlays.set_optimized_locations(&mut surface, &[]).unwrap();
        assert_eq!(overlays.optimized_count(), 0);
    }

    #[test]
    fn test_radius_circle() {
        let mut surface = mounted();
        let probe = surface.probe();
        let mut overlays = PinpointAndOverlayManager::new();
        let center = Coordinate::new(23.0, 70.0);

        overlays
            .set_radius_overlay(&mut surface, Some((center, 100.0)))
            .unwrap();
        overlays
            .set_radius_overlay(&mut surface, Some((center, 50.0)))
            .unwrap();
        let circles = probe.circles();
        assert_eq!(circles.len(), 1);
        assert_eq!(circles[0].radius_m, 50_000.0);
        assert_eq!(circles[0].center, center);

        overlays.set_radius_overlay(&mut surface, None).unwrap();
        assert!(probe.circles().is_empty());
        assert!(!overlays.has_circle());
    }

    #[test]
    fn test_overlays_leave_layers_alone() {
        let mut surface = mounted();
        let probe = surface.probe();
        let group = surface.create_layer_group().unwrap();
        surface
            .add_marker(
                Some(group),
                MarkerSpec {
                    at: Coordinate::new(1.0, 1.0),
                    icon: IconKind::Hub,
                    popup: Popup::default(),
                    z_offset: 0,
                },
            )
            .unwrap();

        let mut overlays = PinpointAndOverlayManager::new();
        overlays
            .set_optimized_locations(&mut surface, &[scored(2.0, 2.0, 5.0)])
            .unwrap();
        overlays.set_optimized_locations(&mut surface, &[]).unwrap();
        assert_eq!(probe.markers_with(IconKind::Hub).len(), 1);
    }
}
