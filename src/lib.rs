pub mod audit;
pub mod capabilities;
pub mod config;
pub mod errors;
pub mod executor;
pub mod grounding;
pub mod perception;
pub mod server;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use crate::audit::ResolutionJournal;
use crate::config::AppConfig;
use crate::errors::{ClickSightError, ClickSightResult};
use crate::executor::input::{ActionExecutor, EnigoPointer, PointerDevice};
use crate::grounding::registry::GrounderRegistry;
use crate::perception::resolver::CoordinateResolver;
use crate::perception::screenshot;
use crate::server::AppState;
use crate::store::ResultStore;

pub async fn run() -> ClickSightResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,clicksight_lib=debug")),
        )
        .init();

    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();

    let cfg = match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config; starting with defaults");
            AppConfig::default()
        }
    };

    // Detect once; everything below receives the result instead of re-checking.
    let pointer: Arc<dyn PointerDevice> = Arc::new(EnigoPointer);
    let detect_pointer = pointer.clone();
    let caps = tokio::task::spawn_blocking(move || capabilities::detect(detect_pointer.as_ref()))
        .await
        .map_err(|e| ClickSightError::Io(std::io::Error::other(e)))?;

    let capture =
        screenshot::provider_for(caps.capture.available, caps.capture.detail.as_deref());
    let executor = if caps.input.available {
        ActionExecutor::new(pointer, Duration::from_millis(cfg.executor.settle_ms))
    } else {
        ActionExecutor::unavailable(
            caps.input
                .detail
                .clone()
                .unwrap_or_else(|| "input synthesis is not available on this host".into()),
        )
    };

    let registry = GrounderRegistry::from_config(&cfg.model);
    let grounder = match registry.get_active() {
        Ok(grounder) => {
            tracing::info!(
                provider = grounder.name(),
                configured = ?registry.list_names(),
                "grounding model ready"
            );
            Some(grounder)
        }
        Err(e) => {
            tracing::warn!(error = %e, "no grounding model; locate routes will fail");
            None
        }
    };

    let store = ResultStore::open(cfg.storage.results_path()).await?;
    let journal = ResolutionJournal::new(store.dir());

    let state = Arc::new(AppState {
        resolver: CoordinateResolver::new(cfg.resolver.density.clone()),
        annotation_radius: cfg.annotation.radius,
        request_timeout: cfg.server.request_timeout(),
        store,
        journal,
        capture,
        executor: Arc::new(executor),
        grounder,
        capabilities: caps,
    });

    let listener = tokio::net::TcpListener::bind(&cfg.server.bind).await?;
    tracing::info!(bind = %cfg.server.bind, "ClickSight listening");
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
