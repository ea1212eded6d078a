//! Request-path to static-resource resolution and the directory-backed store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Pages that are linked without their `.html` suffix.
pub const EXTENSIONLESS_ROUTES: &[&str] = &["/index", "/jobs", "/thanks", "/employers", "/job-detail"];

const DEFAULT_DOCUMENT: &str = "/index.html";

/// A resolved static resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub content_type: String,
    pub body: Bytes,
}

impl IntoResponse for Asset {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&self.content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        response
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

/// Fetch-by-path collaborator; `None` means the resource does not exist.
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Option<Asset>, AssetError>;
}

/// How a request path maps onto one or two store lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetLookup {
    Direct(String),
    PreferHtml { html: String, original: String },
}

#[derive(Debug, Clone)]
pub struct AssetRouter {
    routes: Vec<String>,
}

impl Default for AssetRouter {
    fn default() -> Self {
        Self::new(EXTENSIONLESS_ROUTES.iter().copied())
    }
}

impl AssetRouter {
    pub fn new<I, S>(routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            routes: routes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn resolve(&self, path: &str) -> AssetLookup {
        if path == "/" {
            return AssetLookup::Direct(DEFAULT_DOCUMENT.to_string());
        }

        if self.routes.iter().any(|route| route == path) {
            return AssetLookup::Direct(format!("{path}.html"));
        }

        if !path.contains('.') {
            return AssetLookup::PreferHtml {
                html: format!("{path}.html"),
                original: path.to_string(),
            };
        }

        AssetLookup::Direct(path.to_string())
    }

    pub async fn fetch(
        &self,
        store: &dyn AssetStore,
        path: &str,
    ) -> Result<Option<Asset>, AssetError> {
        match self.resolve(path) {
            AssetLookup::Direct(resource) => store.fetch(&resource).await,
            AssetLookup::PreferHtml { html, original } => match store.fetch(&html).await? {
                Some(asset) => Ok(Some(asset)),
                None => store.fetch(&original).await,
            },
        }
    }
}

/// Serves files below a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryAssetStore {
    root: PathBuf,
}

impl DirectoryAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetStore for DirectoryAssetStore {
    async fn fetch(&self, path: &str) -> Result<Option<Asset>, AssetError> {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() || relative.split('/').any(|segment| segment == "..") {
            return Ok(None);
        }

        let file_path = self.root.join(relative);
        match tokio::fs::metadata(&file_path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) => {
                tracing::debug!(path, error = %err, "asset not found");
                return Ok(None);
            }
        }

        let body = tokio::fs::read(&file_path)
            .await
            .map_err(|source| AssetError::Read {
                path: path.to_string(),
                source,
            })?;

        Ok(Some(Asset {
            content_type: content_type_for(&file_path),
            body: Bytes::from(body),
        }))
    }
}

fn content_type_for(path: &Path) -> String {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    if guessed.type_() == mime::TEXT {
        format!("{}; charset=utf-8", guessed.essence_str())
    } else {
        guessed.essence_str().to_string()
    }
}

pub(crate) fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        assets: HashMap<String, Asset>,
        requested: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn with(mut self, path: &str, body: &str) -> Self {
            self.assets.insert(
                path.to_string(),
                Asset {
                    content_type: "text/html; charset=utf-8".to_string(),
                    body: Bytes::from(body.to_string()),
                },
            );
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl AssetStore for RecordingStore {
        async fn fetch(&self, path: &str) -> Result<Option<Asset>, AssetError> {
            self.requested.lock().expect("lock").push(path.to_string());
            Ok(self.assets.get(path).cloned())
        }
    }

    #[test]
    fn root_maps_to_default_document() {
        let router = AssetRouter::default();
        assert_eq!(router.resolve("/"), AssetLookup::Direct("/index.html".to_string()));
    }

    #[test]
    fn known_routes_gain_html_suffix() {
        let router = AssetRouter::default();
        assert_eq!(
            router.resolve("/jobs"),
            AssetLookup::Direct("/jobs.html".to_string())
        );
        assert_eq!(
            router.resolve("/job-detail"),
            AssetLookup::Direct("/job-detail.html".to_string())
        );
    }

    #[test]
    fn unknown_extensionless_paths_try_html_first() {
        let router = AssetRouter::default();
        assert_eq!(
            router.resolve("/about"),
            AssetLookup::PreferHtml {
                html: "/about.html".to_string(),
                original: "/about".to_string(),
            }
        );
        assert_eq!(
            router.resolve("/css/site.css"),
            AssetLookup::Direct("/css/site.css".to_string())
        );
    }

    #[tokio::test]
    async fn speculative_lookup_falls_back_to_original_path() {
        let store = RecordingStore::default().with("/docs", "directory listing");
        let router = AssetRouter::default();

        let asset = router
            .fetch(&store, "/docs")
            .await
            .expect("fetch succeeds")
            .expect("original path served");

        assert_eq!(asset.body, Bytes::from("directory listing"));
        assert_eq!(store.requested(), vec!["/docs.html", "/docs"]);
    }

    #[tokio::test]
    async fn speculative_lookup_stops_at_html_hit() {
        let store = RecordingStore::default().with("/about.html", "about us");
        let router = AssetRouter::default();

        let asset = router.fetch(&store, "/about").await.expect("fetch succeeds");

        assert!(asset.is_some());
        assert_eq!(store.requested(), vec!["/about.html"]);
    }

    #[tokio::test]
    async fn directory_store_reads_files_and_guesses_types() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").expect("write html");
        std::fs::create_dir(dir.path().join("css")).expect("mkdir");
        std::fs::write(dir.path().join("css/site.css"), "body{}").expect("write css");

        let store = DirectoryAssetStore::new(dir.path());

        let html = store
            .fetch("/index.html")
            .await
            .expect("read")
            .expect("html exists");
        assert_eq!(html.content_type, "text/html; charset=utf-8");

        let css = store
            .fetch("/css/site.css")
            .await
            .expect("read")
            .expect("css exists");
        assert_eq!(css.content_type, "text/css; charset=utf-8");
        assert_eq!(css.body, Bytes::from("body{}"));

        assert!(store.fetch("/css").await.expect("read").is_none());
        assert!(store.fetch("/missing.js").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn directory_store_refuses_parent_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let public = dir.path().join("public");
        std::fs::create_dir(&public).expect("mkdir");
        std::fs::write(dir.path().join("secret.txt"), "nope").expect("write");

        let store = DirectoryAssetStore::new(&public);
        assert!(store
            .fetch("/../secret.txt")
            .await
            .expect("read")
            .is_none());
    }
}
