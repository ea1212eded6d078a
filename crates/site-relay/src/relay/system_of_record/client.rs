use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{ErpNextSettings, SystemOfRecordError};
use crate::relay::submission::Attachment;

const UPLOAD_METHOD: &str = "upload_file";
const ACCESS_CLIENT_ID: HeaderName = HeaderName::from_static("cf-access-client-id");
const ACCESS_CLIENT_SECRET: HeaderName = HeaderName::from_static("cf-access-client-secret");

#[derive(Debug, Deserialize)]
struct ResourceEnvelope {
    data: ResourceData,
}

#[derive(Debug, Deserialize)]
struct ResourceData {
    name: Option<String>,
}

/// Thin ERPNext REST client: resource creation and file upload.
#[derive(Debug, Clone)]
pub struct ErpNextClient {
    http: reqwest::Client,
    base: Url,
    headers: HeaderMap,
}

impl ErpNextClient {
    pub fn from_settings(
        http: reqwest::Client,
        settings: &ErpNextSettings,
    ) -> Result<Self, SystemOfRecordError> {
        let raw_base = settings
            .base_url
            .as_deref()
            .ok_or(SystemOfRecordError::MissingBaseUrl)?;
        let base = Url::parse(raw_base)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| SystemOfRecordError::InvalidBaseUrl(raw_base.to_string()))?;

        Ok(Self {
            http,
            base,
            headers: auth_headers(settings)?,
        })
    }

    /// Creates a document and returns the server-assigned name.
    pub async fn create_resource(
        &self,
        doctype: &str,
        document: &Value,
    ) -> Result<String, SystemOfRecordError> {
        let url = self.endpoint(&["api", "resource", doctype])?;
        let response = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .json(document)
            .send()
            .await
            .map_err(|source| SystemOfRecordError::Transport {
                doctype: doctype.to_string(),
                source,
            })?;
        let response = ensure_success(doctype, response).await?;

        let envelope = response.json::<ResourceEnvelope>().await.map_err(|source| {
            SystemOfRecordError::Transport {
                doctype: doctype.to_string(),
                source,
            }
        })?;

        envelope
            .data
            .name
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| SystemOfRecordError::MissingRecordName {
                doctype: doctype.to_string(),
            })
    }

    /// Uploads a private file bound to an existing document.
    pub async fn upload_file(
        &self,
        doctype: &str,
        docname: &str,
        attachment: &Attachment,
    ) -> Result<(), SystemOfRecordError> {
        let url = self.endpoint(&["api", "method", UPLOAD_METHOD])?;
        let file = Part::bytes(attachment.data.to_vec())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.content_type)
            .map_err(|source| SystemOfRecordError::Transport {
                doctype: doctype.to_string(),
                source,
            })?;
        let form = Form::new()
            .text("is_private", "1")
            .text("doctype", doctype.to_string())
            .text("docname", docname.to_string())
            .part("file", file);

        let response = self
            .http
            .post(url)
            .headers(self.headers.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|source| SystemOfRecordError::Transport {
                doctype: doctype.to_string(),
                source,
            })?;
        ensure_success(doctype, response).await?;
        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, SystemOfRecordError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SystemOfRecordError::InvalidBaseUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn auth_headers(settings: &ErpNextSettings) -> Result<HeaderMap, SystemOfRecordError> {
    let token = match (
        settings.api_token.as_deref(),
        settings.api_key.as_deref(),
        settings.api_secret.as_deref(),
    ) {
        (Some(token), _, _) if token.starts_with("token ") => token.to_string(),
        (Some(token), _, _) => format!("token {token}"),
        (None, Some(key), Some(secret)) => format!("token {key}:{secret}"),
        _ => return Err(SystemOfRecordError::MissingCredentials),
    };

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, sensitive_value(&token)?);

    if let (Some(id), Some(secret)) = (
        settings.access_client_id.as_deref(),
        settings.access_client_secret.as_deref(),
    ) {
        headers.insert(ACCESS_CLIENT_ID, sensitive_value(id)?);
        headers.insert(ACCESS_CLIENT_SECRET, sensitive_value(secret)?);
    }

    Ok(headers)
}

fn sensitive_value(raw: &str) -> Result<HeaderValue, SystemOfRecordError> {
    let mut value =
        HeaderValue::from_str(raw).map_err(|_| SystemOfRecordError::InvalidCredentials)?;
    value.set_sensitive(true);
    Ok(value)
}

async fn ensure_success(
    doctype: &str,
    response: Response,
) -> Result<Response, SystemOfRecordError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SystemOfRecordError::Rejected {
        doctype: doctype.to_string(),
        status: status.as_u16(),
        message: remote_error_message(status, &body),
    })
}

/// Best available explanation from an ERPNext error response.
pub(crate) fn remote_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(body) {
        let message = ["exception", "message", "_error_message"]
            .iter()
            .filter_map(|key| object.get(*key))
            .find_map(|value| match value {
                Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                _ => None,
            });
        if let Some(message) = message {
            return message;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        trimmed.to_string()
    }
}
