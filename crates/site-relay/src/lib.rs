//! Static website router plus a form-submission relay that forwards website
//! forms to a backup form service and to ERPNext.

pub mod config;
pub mod error;
pub mod relay;
pub mod site;
pub mod telemetry;

use std::sync::Arc;

use axum::middleware;
use axum::Router;

use relay::{relay_router, SubmissionOrchestrator};
use site::cors::{inject_cors_headers, AllowedOrigins};
use site::{site_router, SiteState};

/// Relay endpoints take precedence; every other path is served from the
/// asset store.
pub fn website_router(site: SiteState, orchestrator: Arc<SubmissionOrchestrator>) -> Router {
    relay_router(orchestrator).merge(site_router(site))
}

/// Stamps CORS headers on every response the router produces. Apply last so
/// service routes added by the host are covered too.
pub fn with_cors(router: Router, allowed: AllowedOrigins) -> Router {
    router.layer(middleware::from_fn_with_state(
        Arc::new(allowed),
        inject_cors_headers,
    ))
}
