use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::config::{RelayConfig, TurnstileConfig};
use crate::relay::domain::FormKind;
use crate::relay::fallback::FallbackTargets;
use crate::relay::system_of_record::ErpNextSettings;

/// One request as seen by a mock upstream.
#[derive(Debug, Clone)]
pub(super) struct RecordedRequest {
    pub(super) method: Method,
    pub(super) path: String,
    pub(super) headers: HeaderMap,
    pub(super) body: Bytes,
}

impl RecordedRequest {
    pub(super) fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(super) fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("json request body")
    }

    pub(super) fn content_type(&self) -> &str {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
    }
}

type Responder = Arc<dyn Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync>;

#[derive(Clone)]
struct UpstreamState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Responder,
}

/// Local HTTP server that records every request and answers with whatever the
/// responder returns.
#[derive(Clone)]
pub(super) struct MockUpstream {
    base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub(super) async fn spawn<F>(responder: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            requests: requests.clone(),
            responder: Arc::new(responder),
        };
        let app = Router::new().fallback(record).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream serves");
        });

        Self {
            base: format!("http://{addr}"),
            requests,
        }
    }

    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub(super) fn base(&self) -> &str {
        &self.base
    }

    pub(super) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests mutex").clone()
    }

    pub(super) fn paths(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .map(|request| request.path)
            .collect()
    }
}

async fn record(State(state): State<UpstreamState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, usize::MAX).await.unwrap_or_default();
    let recorded = RecordedRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        body,
    };

    let (status, payload) = (state.responder)(&recorded);
    state
        .requests
        .lock()
        .expect("requests mutex")
        .push(recorded);
    (status, axum::Json(payload)).into_response()
}

/// ERPNext stand-in: every resource gets a predictable name, uploads succeed.
pub(super) async fn erpnext_upstream() -> MockUpstream {
    MockUpstream::spawn(|request| {
        if request.path == "/api/method/upload_file" {
            return (StatusCode::OK, json!({ "message": { "name": "file-0001" } }));
        }
        let doctype = request
            .path
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .replace("%20", "-")
            .to_ascii_uppercase();
        (StatusCode::OK, json!({ "data": { "name": format!("{doctype}-0001") } }))
    })
    .await
}

pub(super) async fn failing_upstream(status: StatusCode) -> MockUpstream {
    MockUpstream::spawn(move |_| (status, json!({ "exception": "upstream unavailable" }))).await
}

pub(super) async fn accepting_upstream() -> MockUpstream {
    MockUpstream::spawn(|_| (StatusCode::OK, json!({ "ok": true }))).await
}

/// Challenge service accepting only `good-token`.
pub(super) async fn verify_upstream() -> MockUpstream {
    MockUpstream::spawn(|request| {
        let accepted = request.body_text().contains("response=good-token");
        (StatusCode::OK, json!({ "success": accepted }))
    })
    .await
}

pub(super) fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()
        .expect("test client")
}

pub(super) fn erpnext_settings(erp: &MockUpstream) -> ErpNextSettings {
    ErpNextSettings {
        base_url: Some(erp.base().to_string()),
        api_token: Some("key:secret".to_string()),
        lead_doctype: "Lead".to_string(),
        applicant_doctype: "Job Applicant".to_string(),
        ..ErpNextSettings::default()
    }
}

/// Every known kind routed to `fallback`.
pub(super) fn fallback_targets(fallback: &MockUpstream) -> FallbackTargets {
    FormKind::ALL
        .into_iter()
        .fold(FallbackTargets::default(), |targets, kind| {
            targets.with(kind, fallback.url(&format!("/forms/{kind}")))
        })
}

pub(super) fn relay_config(
    erp: &MockUpstream,
    fallback: FallbackTargets,
    verify: Option<&MockUpstream>,
) -> RelayConfig {
    RelayConfig {
        turnstile: TurnstileConfig {
            secret: verify.map(|_| "challenge-secret".to_string()),
            verify_url: verify
                .map(|upstream| upstream.url("/siteverify"))
                .unwrap_or_default(),
        },
        fallback,
        erpnext: erpnext_settings(erp),
        defer_system_of_record: false,
    }
}

pub(super) fn form_request(uri: &str, body: &str) -> Request {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "www.example.com")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("cf-connecting-ip", "203.0.113.7")
        .header(header::USER_AGENT, "Mozilla/5.0")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub(super) const BOUNDARY: &str = "relay-test-boundary";

/// Hand-built multipart body: `(name, Some((filename, content type)), bytes)`
/// for files, `(name, None, text)` for plain fields.
pub(super) fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file {
            Some((file_name, content_type)) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub(super) fn multipart_request(uri: &str, body: Vec<u8>) -> Request {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::HOST, "www.example.com")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}
