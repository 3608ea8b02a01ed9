//! Headless siting session

use log::info;
use std::sync::Arc;
use std::time::Duration;
use svc_siting::analysis::orchestrator::{AnalysisOrchestrator, OrchestratorConfig};
use svc_siting::geospatial::naming::{LocationNameResolver, NominatimGeocoder};
use svc_siting::map::controller::MapSurfaceController;
use svc_siting::map::headless::HeadlessSurface;
use svc_siting::map::layers::VisibilityFlags;
use svc_siting::map::{ContainerHandle, MapOptions};
use svc_siting::session::SiteSession;
use svc_siting::*;
use svc_siting_client_rest::prelude::*;

/// Attempts made to find the map container before giving up
const CONTAINER_ATTEMPTS: u32 = 5;

/// Delay between two container lookups
const CONTAINER_RETRY_DELAY: Duration = Duration::from_millis(200);

fn scoring_client(config: &Config) -> Result<Arc<dyn ScoringService>, ClientError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "stub_backends")] {
            let _ = config;
            Ok(Arc::new(StubClient::new_client("scoring")))
        } else {
            Ok(Arc::new(RestClient::new_client(
                &config.scoring_base_url,
                "scoring",
                Duration::from_millis(config.request_timeout_ms),
            )?))
        }
    }
}

#[tokio::main]
#[cfg(not(tarpaulin_include))]
async fn main() -> anyhow::Result<()> {
    // Will use default config settings if no environment vars are found.
    let config = Config::try_from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration from environment: {}", e))?;

    // Try to load log configuration from the provided log file.
    // Will default to stdout debug logging if the file can not be loaded.
    load_logger_config_from_file(config.log_config.as_str())
        .await
        .or_else(|e| Ok::<(), String>(log::error!("(main) {}", e)))
        .map_err(|e| anyhow::anyhow!(e))?;

    info!("(main) Session startup.");

    let geocoder = NominatimGeocoder::new(
        &config.geocoder_base_url,
        &config.geocoder_user_agent,
        config.geocoder_zoom,
        Duration::from_millis(config.request_timeout_ms),
    )?;
    let resolver = Arc::new(LocationNameResolver::new(
        Arc::new(geocoder),
        config.name_cache_precision,
        config.geocoder_max_concurrency,
    ));
    let orchestrator = Arc::new(AnalysisOrchestrator::new(
        scoring_client(&config)?,
        resolver,
        OrchestratorConfig::from(&config),
    ));

    let controller = MapSurfaceController::new(
        Box::new(HeadlessSurface::new()),
        MapOptions::from(&config),
        VisibilityFlags::default(),
    );
    let mut session = SiteSession::new(controller, orchestrator.clone());

    session
        .start(
            &ContainerHandle::new("map-container"),
            CONTAINER_ATTEMPTS,
            CONTAINER_RETRY_DELAY,
        )
        .await?;

    match session.load_corpus().await {
        Ok(count) => info!("(main) {} infrastructure features loaded.", count),
        Err(e) => log::error!("(main) infrastructure unavailable: {}", e),
    }

    match session.spawn_grid().await? {
        Ok(outcome) => info!("(main) grid analysis {:?}.", outcome),
        Err(e) => log::error!("(main) grid analysis failed: {}", e),
    }
    session.sync()?;

    let state = orchestrator.snapshot();
    if let Some(batch) = &state.grid.result {
        for site in &batch.sites {
            info!("(main) {}", serde_json::to_string(site)?);
        }
    }
    for (kind, status) in state.statuses() {
        info!("(main) {}: {:?}", kind, status);
    }
    info!(
        "(main) {} layer markers, {} optimized markers on the map.",
        session.controller().layers().total_drawn(),
        session.controller().overlays().optimized_count()
    );

    session.teardown();
    info!("(main) Session shutdown.");

    // Make sure all log message are written/ displayed before shutdown
    log::logger().flush();

    Ok(())
}
