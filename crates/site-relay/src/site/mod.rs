//! Static website surface: asset resolution, HTML site-key substitution and CORS.

pub mod assets;
pub mod cors;
pub mod html;

use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::config::SiteConfig;
use crate::error::AppError;
use assets::{AssetRouter, AssetStore, DirectoryAssetStore};

pub const PING_PATH: &str = "/__ping";

#[derive(Clone)]
pub struct SiteState {
    store: Arc<dyn AssetStore>,
    router: AssetRouter,
    site_key: Arc<str>,
}

impl SiteState {
    pub fn new(store: Arc<dyn AssetStore>, router: AssetRouter, site_key: &str) -> Self {
        Self {
            store,
            router,
            site_key: Arc::from(site_key),
        }
    }

    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(
            Arc::new(DirectoryAssetStore::new(config.assets_dir.clone())),
            AssetRouter::default(),
            &config.turnstile_site_key,
        )
    }
}

/// `/__ping` plus a catch-all that serves static assets.
pub fn site_router(state: SiteState) -> Router {
    Router::new()
        .route(PING_PATH, get(ping))
        .fallback(serve_asset)
        .with_state(state)
}

pub(crate) async fn ping() -> &'static str {
    "pong"
}

pub(crate) async fn serve_asset(
    State(state): State<SiteState>,
    uri: Uri,
) -> Result<Response, AppError> {
    let response = match state.router.fetch(state.store.as_ref(), uri.path()).await? {
        Some(asset) => asset.into_response(),
        None => assets::not_found(),
    };

    Ok(html::rewrite(response, &state.site_key).await)
}
