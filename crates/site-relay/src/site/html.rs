use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Token in served HTML replaced with the configured challenge site key.
pub const SITE_KEY_PLACEHOLDER: &str = "__TURNSTILE_SITE_KEY__";

/// Substitutes the site key into HTML bodies; everything else passes through.
pub async fn rewrite(response: Response, site_key: &str) -> Response {
    if !is_html(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "failed to buffer html body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => Bytes::from(text.replace(SITE_KEY_PLACEHOLDER, site_key)),
        Err(_) => bytes,
    };

    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .is_some_and(|parsed| parsed.essence_str() == mime::TEXT_HTML.essence_str())
}
