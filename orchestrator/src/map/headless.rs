//! In-memory rendering engine.
//!
//! Keeps the scene a real engine would draw so that sessions can run
//! without a display, and lets callers inspect it and inject clicks
//! through a [`HeadlessProbe`].

use super::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

/// A marker as placed on the scene
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub id: MarkerId,
    pub group: Option<GroupId>,
    pub spec: MarkerSpec,
}

#[derive(Debug, Default)]
struct Scene {
    container_ready: bool,
    mounted: Option<ContainerHandle>,
    options: Option<MapOptions>,
    center: Option<Coordinate>,
    groups: BTreeSet<u64>,
    markers: BTreeMap<u64, PlacedMarker>,
    circles: BTreeMap<u64, CircleSpec>,
    listeners: HashMap<u64, UnboundedSender<Coordinate>>,
    stuck_markers: BTreeSet<u64>,
    next_id: u64,
    mounts: usize,
    destroys: usize,
}

impl Scene {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn ensure_mounted(&self) -> Result<(), SurfaceError> {
        match self.mounted {
            Some(_) => Ok(()),
            None => Err(SurfaceError::NotMounted),
        }
    }
}

fn lock(scene: &Mutex<Scene>) -> Result<std::sync::MutexGuard<'_, Scene>, SurfaceError> {
    scene
        .lock()
        .map_err(|_| SurfaceError::Engine("scene lock poisoned".to_string()))
}

/// [`MapSurface`] drawing into memory
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    scene: Arc<Mutex<Scene>>,
}

/// Read access to a [`HeadlessSurface`] scene, plus click injection
#[derive(Debug, Clone)]
pub struct HeadlessProbe {
    scene: Arc<Mutex<Scene>>,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessSurface {
    /// A surface whose container is ready
    pub fn new() -> Self {
        let scene = Scene {
            container_ready: true,
            ..Default::default()
        };

        Self {
            scene: Arc::new(Mutex::new(scene)),
        }
    }

    /// A surface whose container is not ready until the probe says so
    pub fn without_container() -> Self {
        Self {
            scene: Arc::new(Mutex::new(Scene::default())),
        }
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            scene: self.scene.clone(),
        }
    }
}

impl MapSurface for HeadlessSurface {
    fn container_ready(&self, _container: &ContainerHandle) -> bool {
        lock(&self.scene).map(|s| s.container_ready).unwrap_or(false)
    }

    fn mount(
        &mut self,
        container: &ContainerHandle,
        options: &MapOptions,
    ) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        if !scene.container_ready {
            return Err(SurfaceError::ContainerUnavailable(container.0.clone()));
        }
        if scene.mounted.is_some() {
            return Err(SurfaceError::Engine(format!(
                "container [{}] already holds a map",
                container.0
            )));
        }

        scene.mounted = Some(container.clone());
        scene.options = Some(options.clone());
        scene.center = Some(options.view.center);
        scene.mounts += 1;
        map_debug!("(mount HEADLESS) map created in [{}].", container.0);
        Ok(())
    }

    fn create_layer_group(&mut self) -> Result<GroupId, SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        let id = scene.next_id();
        scene.groups.insert(id);
        Ok(GroupId(id))
    }

    fn clear_layer_group(&mut self, group: GroupId) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        if !scene.groups.contains(&group.0) {
            return Err(SurfaceError::UnknownGroup(group));
        }

        scene.markers.retain(|_, m| m.group != Some(group));
        Ok(())
    }

    fn add_marker(
        &mut self,
        group: Option<GroupId>,
        marker: MarkerSpec,
    ) -> Result<MarkerId, SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        if let Some(group) = group {
            if !scene.groups.contains(&group.0) {
                return Err(SurfaceError::UnknownGroup(group));
            }
        }

        let id = MarkerId(scene.next_id());
        scene.markers.insert(
            id.0,
            PlacedMarker {
                id,
                group,
                spec: marker,
            },
        );
        Ok(id)
    }

    fn move_marker(&mut self, id: MarkerId, to: Coordinate) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        let marker = scene
            .markers
            .get_mut(&id.0)
            .ok_or(SurfaceError::UnknownMarker(id))?;
        marker.spec.at = to;
        Ok(())
    }

    fn remove_marker(&mut self, id: MarkerId) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        if scene.stuck_markers.contains(&id.0) {
            return Err(SurfaceError::Engine(format!("marker {} is stuck", id.0)));
        }
        scene
            .markers
            .remove(&id.0)
            .map(|_| ())
            .ok_or(SurfaceError::UnknownMarker(id))
    }

    fn pan_to(&mut self, at: Coordinate) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        scene.center = Some(at);
        Ok(())
    }

    fn add_circle(&mut self, circle: CircleSpec) -> Result<CircleId, SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        let id = scene.next_id();
        scene.circles.insert(id, circle);
        Ok(CircleId(id))
    }

    fn remove_circle(&mut self, id: CircleId) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene
            .circles
            .remove(&id.0)
            .map(|_| ())
            .ok_or(SurfaceError::UnknownCircle(id))
    }

    fn subscribe_clicks(
        &mut self,
        sink: UnboundedSender<Coordinate>,
    ) -> Result<ListenerId, SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.ensure_mounted()?;
        let id = scene.next_id();
        scene.listeners.insert(id, sink);
        Ok(ListenerId(id))
    }

    fn unsubscribe(&mut self, id: ListenerId) -> Result<(), SurfaceError> {
        let mut scene = lock(&self.scene)?;
        scene.listeners.remove(&id.0);
        Ok(())
    }

    fn destroy(&mut self) {
        let Ok(mut scene) = lock(&self.scene) else {
            map_error!("(destroy HEADLESS) could not lock the scene.");
            return;
        };

        scene.mounted = None;
        scene.options = None;
        scene.center = None;
        scene.groups.clear();
        scene.markers.clear();
        scene.circles.clear();
        scene.listeners.clear();
        scene.destroys += 1;
        map_debug!("(destroy HEADLESS) map released.");
    }
}

impl HeadlessProbe {
    fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&Scene) -> T,
        T: Default,
    {
        lock(&self.scene).map(|s| f(&s)).unwrap_or_default()
    }

    /// Make the container available (or not) to the next mount
    pub fn set_container_ready(&self, ready: bool) {
        if let Ok(mut scene) = lock(&self.scene) {
            scene.container_ready = ready;
        }
    }

    /// Make removals of `id` fail with an engine error until unstuck
    pub fn set_marker_stuck(&self, id: MarkerId, stuck: bool) {
        if let Ok(mut scene) = lock(&self.scene) {
            if stuck {
                scene.stuck_markers.insert(id.0);
            } else {
                scene.stuck_markers.remove(&id.0);
            }
        }
    }

    /// Simulate a user click; returns the number of listeners reached
    pub fn click(&self, at: Coordinate) -> usize {
        self.read(|s| {
            s.listeners
                .values()
                .filter(|sink| sink.send(at).is_ok())
                .count()
        })
    }

    pub fn is_mounted(&self) -> bool {
        self.read(|s| s.mounted.is_some())
    }

    /// Number of map instances created so far
    pub fn mounts(&self) -> usize {
        self.read(|s| s.mounts)
    }

    /// Number of map instances released so far
    pub fn destroys(&self) -> usize {
        self.read(|s| s.destroys)
    }

    pub fn listeners(&self) -> usize {
        self.read(|s| s.listeners.len())
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.read(|s| s.center)
    }

    pub fn options(&self) -> Option<MapOptions> {
        self.read(|s| s.options.clone())
    }

    pub fn markers(&self) -> Vec<PlacedMarker> {
        self.read(|s| s.markers.values().cloned().collect())
    }

    /// Markers drawn with `icon`
    pub fn markers_with(&self, icon: IconKind) -> Vec<PlacedMarker> {
        self.read(|s| {
            s.markers
                .values()
                .filter(|m| m.spec.icon == icon)
                .cloned()
                .collect()
        })
    }

    pub fn marker_count(&self) -> usize {
        self.read(|s| s.markers.len())
    }

    pub fn circles(&self) -> Vec<CircleSpec> {
        self.read(|s| s.circles.values().copied().collect())
    }
}
