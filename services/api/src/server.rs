use crate::cli::ServeArgs;
use crate::infra::{shutdown_signal, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use site_relay::config::AppConfig;
use site_relay::error::AppError;
use site_relay::relay::{self, SubmissionOrchestrator, TokioBackgroundTasks};
use site_relay::site::SiteState;
use site_relay::{telemetry, website_router, with_cors};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(assets_dir) = args.assets_dir.take() {
        config.site.assets_dir = assets_dir;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let http = relay::http_client()?;
    let background = Arc::new(TokioBackgroundTasks::new());
    let mut orchestrator = SubmissionOrchestrator::from_config(&config.relay, http);
    if config.relay.defer_system_of_record {
        orchestrator = orchestrator.with_background(background.clone());
    }

    let site = SiteState::from_config(&config.site);
    let app = with_service_routes(website_router(site, Arc::new(orchestrator)))
        .layer(Extension(app_state))
        .layer(prometheus_layer);
    let app = with_cors(app, config.site.allowed_origins.clone());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        assets_dir = %config.site.assets_dir.display(),
        fallback_kinds = config.relay.fallback.kinds().count(),
        challenge = config.relay.turnstile.secret.is_some(),
        deferred = config.relay.defer_system_of_record,
        "site relay ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(readiness_flag))
        .await?;

    background.drain().await;
    info!("site relay stopped");
    Ok(())
}
