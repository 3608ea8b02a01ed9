//! One user session: the map controller driven by the analysis state.
//!
//! The session is the single owner task of the map. Clicks coming off the
//! surface are routed through the orchestrator, dispatches run on their
//! own tasks, and every published state change is mirrored onto the map
//! overlays by [`SiteSession::sync`].

use crate::analysis::orchestrator::{AnalysisOrchestrator, ClickRoute, DispatchOutcome};
use crate::analysis::state::AppState;
use crate::analysis::{AnalysisError, AnalysisKind, TransportError};
use crate::geospatial::Coordinate;
use crate::map::controller::{InitOutcome, MapSurfaceController};
use crate::map::features::{FeatureCorpus, LayerKey};
use crate::map::{ContainerHandle, SurfaceError};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use svc_siting_client_rest::types::ScoredLocation;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle of a dispatch running on its own task
pub type DispatchHandle = JoinHandle<Result<DispatchOutcome, AnalysisError>>;

/// Errors raised while driving a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// The map engine refused an operation
    Surface(SurfaceError),

    /// The backend could not be reached
    Transport(TransportError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            SessionError::Surface(e) => write!(f, "{e}"),
            SessionError::Transport(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<SurfaceError> for SessionError {
    fn from(e: SurfaceError) -> Self {
        SessionError::Surface(e)
    }
}

impl From<TransportError> for SessionError {
    fn from(e: TransportError) -> Self {
        SessionError::Transport(e)
    }
}

/// Overlays as last drawn on the map
#[derive(Debug, Default, PartialEq)]
struct Drawn {
    pinpoint: Option<Coordinate>,
    optimized: Vec<ScoredLocation>,
    circle: Option<(Coordinate, f64)>,
}

impl Drawn {
    fn from_state(state: &AppState) -> Self {
        let circle = match (state.radius.active, state.radius.center_point) {
            (true, Some(center)) => Some((center, state.radius.radius_km)),
            _ => None,
        };

        Self {
            pinpoint: state.pinpoint,
            optimized: state
                .optimized
                .as_ref()
                .map(|o| o.locations.clone())
                .unwrap_or_default(),
            circle,
        }
    }
}

/// A map and the analyses run from it
#[derive(Debug)]
pub struct SiteSession {
    controller: MapSurfaceController,
    orchestrator: Arc<AnalysisOrchestrator>,
    state: watch::Receiver<AppState>,
    drawn: Drawn,
}

impl SiteSession {
    pub fn new(controller: MapSurfaceController, orchestrator: Arc<AnalysisOrchestrator>) -> Self {
        let state = orchestrator.subscribe();
        Self {
            controller,
            orchestrator,
            state,
            drawn: Drawn::default(),
        }
    }

    pub fn controller(&self) -> &MapSurfaceController {
        &self.controller
    }

    pub fn orchestrator(&self) -> &Arc<AnalysisOrchestrator> {
        &self.orchestrator
    }

    /// Mount the map, waiting for the container if needed, and draw the
    /// current state on it
    pub async fn start(
        &mut self,
        container: &ContainerHandle,
        attempts: u32,
        delay: Duration,
    ) -> Result<InitOutcome, SurfaceError> {
        let outcome = self
            .controller
            .initialize_with_retry(container, attempts, delay)
            .await?;

        if outcome == InitOutcome::Created {
            // a fresh instance holds no overlays
            self.drawn = Drawn::default();
        }
        self.sync()?;
        Ok(outcome)
    }

    /// Fetch the infrastructure corpus and hand it to the layers.
    /// Returns the number of features loaded.
    pub async fn load_corpus(&mut self) -> Result<usize, SessionError> {
        let data = self.orchestrator.load_map_data().await?;
        let corpus = Arc::new(FeatureCorpus::from_map_data(&data));
        let count = corpus.len();
        self.controller.set_corpus(corpus)?;
        Ok(count)
    }

    fn spawn<F, Fut>(&self, f: F) -> DispatchHandle
    where
        F: FnOnce(Arc<AnalysisOrchestrator>) -> Fut,
        Fut: Future<Output = Result<DispatchOutcome, AnalysisError>> + Send + 'static,
    {
        let dispatch = f(self.orchestrator.clone());
        tokio::spawn(async move {
            let outcome = dispatch.await;
            if let Err(e) = &outcome {
                analysis_warn!("(spawn) dispatch failed: {}", e);
            }
            outcome
        })
    }

    /// Route a map click. A click outside radius mode starts a
    /// feasibility dispatch, whose handle is returned.
    pub fn handle_click(
        &mut self,
        at: Coordinate,
    ) -> Result<(ClickRoute, Option<DispatchHandle>), SurfaceError> {
        let route = self.orchestrator.route_click(at);
        let handle = match route {
            ClickRoute::Feasibility => {
                Some(self.spawn(move |o| async move { o.dispatch_feasibility(at).await }))
            }
            ClickRoute::RadiusCenter => None,
        };

        self.sync()?;
        Ok((route, handle))
    }

    pub fn spawn_grid(&self) -> DispatchHandle {
        self.spawn(|o| async move { o.dispatch_grid().await })
    }

    pub fn spawn_radius(&self) -> DispatchHandle {
        self.spawn(|o| async move { o.dispatch_radius().await })
    }

    pub fn spawn_power_supply(&self) -> DispatchHandle {
        self.spawn(|o| async move { o.dispatch_power_supply().await })
    }

    /// Flip radius mode and redraw, returning the new mode
    pub fn toggle_radius_mode(&mut self) -> Result<bool, SurfaceError> {
        let active = self.orchestrator.toggle_radius_mode();
        self.sync()?;
        Ok(active)
    }

    /// Show or hide an infrastructure layer, returning its new visibility
    pub fn toggle_layer(&mut self, key: LayerKey) -> Result<bool, SurfaceError> {
        self.controller.toggle_layer(key)
    }

    /// Move the pinpoint to a ranked grid or radius result
    pub fn select_result(
        &mut self,
        kind: AnalysisKind,
        rank: usize,
    ) -> Result<Option<Coordinate>, SurfaceError> {
        let at = self.orchestrator.select_result(kind, rank);
        self.sync()?;
        Ok(at)
    }

    /// Bring the overlays in line with the latest published state.
    /// Only the overlays that changed are redrawn.
    pub fn sync(&mut self) -> Result<(), SurfaceError> {
        if !self.controller.is_live() {
            return Ok(());
        }

        let wanted = Drawn::from_state(&self.state.borrow_and_update());

        if wanted.pinpoint != self.drawn.pinpoint {
            self.controller.set_pinpoint(wanted.pinpoint)?;
        }
        if wanted.optimized != self.drawn.optimized {
            self.controller.set_optimized_locations(&wanted.optimized)?;
        }
        if wanted.circle != self.drawn.circle {
            self.controller.set_radius_overlay(wanted.circle)?;
        }

        self.drawn = wanted;
        Ok(())
    }

    /// Serve clicks and state changes until `shutdown` resolves or the
    /// map goes away
    pub async fn run<S>(&mut self, shutdown: S) -> Result<(), SurfaceError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        while self.controller.is_live() {
            tokio::select! {
                _ = &mut shutdown => {
                    map_info!("(run) shutdown requested.");
                    break;
                }
                click = self.controller.next_click() => match click {
                    Some(at) => {
                        self.handle_click(at)?;
                    }
                    None => {
                        map_warn!("(run) click stream closed.");
                        break;
                    }
                },
                changed = self.state.changed() => {
                    if changed.is_err() {
                        analysis_warn!("(run) state publisher gone.");
                        break;
                    }
                    self.sync()?;
                }
            }
        }

        Ok(())
    }

    /// Release the map. Returns false if it was already released.
    pub fn teardown(&mut self) -> bool {
        self.drawn = Drawn::default();
        self.controller.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::orchestrator::OrchestratorConfig;
    use crate::analysis::state::RequestStatus;
    use crate::geospatial::naming::LocationNameResolver;
    use crate::map::headless::{HeadlessProbe, HeadlessSurface};
    use crate::map::layers::VisibilityFlags;
    use crate::map::{IconKind, MapOptions};
    use crate::test_util::{FakeGeocoder, FakeScoring, Op};

    async fn session(fake: FakeScoring) -> (SiteSession, HeadlessProbe, Arc<FakeScoring>) {
        let fake = Arc::new(fake);
        let resolver = Arc::new(LocationNameResolver::new(
            Arc::new(FakeGeocoder::named("Bhuj", "Gujarat")),
            3,
            4,
        ));
        let config = crate::Config::new();
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            fake.clone(),
            resolver,
            OrchestratorConfig::from(&config),
        ));

        let surface = HeadlessSurface::new();
        let probe = surface.probe();
        let controller = MapSurfaceController::new(
            Box::new(surface),
            MapOptions::from(&config),
            VisibilityFlags::default(),
        );

        let mut session = SiteSession::new(controller, orchestrator);
        session
            .start(
                &ContainerHandle::new("map-container"),
                3,
                Duration::from_millis(5),
            )
            .await
            .unwrap();
        (session, probe, fake)
    }

    #[tokio::test]
    async fn test_click_scores_location() {
        crate::get_log_handle().await;
        ut_info!("(test_click_scores_location) Start.");

        let (mut session, probe, fake) = session(FakeScoring::new()).await;
        let at = Coordinate::new(22.3, 70.8);

        let (route, handle) = session.handle_click(at).unwrap();
        assert_eq!(route, ClickRoute::Feasibility);
        assert_eq!(handle.unwrap().await.unwrap(), Ok(DispatchOutcome::Applied));
        assert_eq!(fake.calls(Op::Feasibility), 1);

        let pins = probe.markers_with(IconKind::Pinpoint);
        assert_eq!(pins.len(), 1);
        assert_eq!(pins[0].spec.at, at);

        let state = session.orchestrator().snapshot();
        assert_eq!(state.feasibility.status, RequestStatus::Success);

        ut_info!("(test_click_scores_location) Success.");
    }

    #[tokio::test]
    async fn test_radius_flow() {
        let (mut session, probe, fake) = session(FakeScoring::new()).await;
        let center = Coordinate::new(23.0, 70.0);

        assert_eq!(session.toggle_radius_mode(), Ok(true));
        let (route, handle) = session.handle_click(center).unwrap();
        assert_eq!(route, ClickRoute::RadiusCenter);
        assert!(handle.is_none());
        assert_eq!(fake.calls(Op::Feasibility), 0);

        let circles = probe.circles();
        assert_eq!(circles.len(), 1);
        assert_eq!(circles[0].center, center);
        assert_eq!(circles[0].radius_m, 100_000.0);

        let outcome = session.spawn_radius().await.unwrap();
        assert_eq!(outcome, Ok(DispatchOutcome::Applied));
        session.sync().unwrap();
        assert_eq!(probe.markers_with(IconKind::Optimized).len(), 3);

        // leaving radius mode drops its results, markers and circle
        assert_eq!(session.toggle_radius_mode(), Ok(false));
        assert!(probe.markers_with(IconKind::Optimized).is_empty());
        assert!(probe.circles().is_empty());
        // the pinpoint stays
        assert_eq!(probe.markers_with(IconKind::Pinpoint).len(), 1);
    }

    #[tokio::test]
    async fn test_grid_results_and_selection() {
        let (mut session, probe, _) = session(FakeScoring::new()).await;

        let outcome = session.spawn_grid().await.unwrap();
        assert_eq!(outcome, Ok(DispatchOutcome::Applied));
        session.sync().unwrap();
        assert_eq!(probe.markers_with(IconKind::Optimized).len(), 5);

        let at = session.select_result(AnalysisKind::Grid, 2).unwrap();
        assert_eq!(at, Some(Coordinate::new(21.0, 72.0)));
        assert_eq!(probe.center(), Some(Coordinate::new(21.0, 72.0)));
        assert_eq!(session.select_result(AnalysisKind::Grid, 9), Ok(None));
    }

    #[tokio::test]
    async fn test_failed_grid_keeps_shown_batch() {
        let (mut session, probe, fake) = session(FakeScoring::new()).await;

        assert_eq!(
            session.spawn_grid().await.unwrap(),
            Ok(DispatchOutcome::Applied)
        );
        session.sync().unwrap();
        let first = session.orchestrator().snapshot().grid.result.unwrap();

        fake.set_failing(Op::Grid, true);
        assert!(matches!(
            session.spawn_grid().await.unwrap(),
            Err(AnalysisError::Transport(_))
        ));
        session.sync().unwrap();

        let state = session.orchestrator().snapshot();
        assert_eq!(state.grid.status, RequestStatus::Error);
        let kept = state.grid.result.unwrap();
        assert_eq!(kept.raw, first.raw);
        assert_eq!(
            probe.markers_with(IconKind::Optimized).len(),
            kept.sites.len()
        );
        assert_eq!(
            session.select_result(AnalysisKind::Grid, 1),
            Ok(Some(first.sites[0].coordinate))
        );
    }

    #[tokio::test]
    async fn test_power_supply_needs_pinpoint() {
        let (session, _, fake) = session(FakeScoring::new()).await;

        let outcome = session.spawn_power_supply().await.unwrap();
        assert!(outcome.is_err());
        assert_eq!(fake.calls(Op::PowerSupply), 0);
        assert_eq!(
            session.orchestrator().snapshot().power_supply.status,
            RequestStatus::Idle
        );
    }

    #[tokio::test]
    async fn test_load_corpus_draws_layers() {
        let (mut session, probe, _) = session(FakeScoring::new()).await;

        assert_eq!(session.load_corpus().await, Ok(8));
        assert_eq!(probe.marker_count(), 5);
        assert_eq!(session.toggle_layer(LayerKey::Wind), Ok(true));
        assert_eq!(probe.markers_with(IconKind::Wind).len(), 1);
    }

    #[tokio::test]
    async fn test_load_corpus_failure() {
        let (mut session, probe, _) = session(FakeScoring::new().fail(Op::MapData)).await;

        let result = session.load_corpus().await;
        assert!(matches!(result, Err(SessionError::Transport(e)) if e.retryable));
        assert_eq!(probe.marker_count(), 0);
    }

    #[tokio::test]
    async fn test_run_serves_clicks_until_shutdown() {
        let (mut session, probe, fake) = session(FakeScoring::new()).await;

        probe.click(Coordinate::new(19.0, 73.0));
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(());
        });

        session
            .run(async move {
                let _ = rx.await;
            })
            .await
            .unwrap();

        assert_eq!(fake.calls(Op::Feasibility), 1);
        assert_eq!(
            probe.markers_with(IconKind::Pinpoint)[0].spec.at,
            Coordinate::new(19.0, 73.0)
        );
        assert_eq!(
            session.orchestrator().snapshot().feasibility.status,
            RequestStatus::Success
        );
    }

    #[tokio::test]
    async fn test_teardown_then_sync_is_noop() {
        let (mut session, probe, _) = session(FakeScoring::new()).await;

        assert!(session.teardown());
        assert!(!session.teardown());
        session
            .orchestrator()
            .set_pinpoint(Some(Coordinate::new(1.0, 1.0)));
        assert_eq!(session.sync(), Ok(()));
        assert_eq!(probe.marker_count(), 0);
        assert_eq!(probe.destroys(), 1);
    }
}
