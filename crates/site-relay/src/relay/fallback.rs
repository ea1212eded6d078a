//! Redundant delivery to the backup form-collection service.

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};

use super::domain::FormKind;
use super::submission::{FieldValue, Submission, SubmissionEncoding};

const LEGACY_MESSAGE_FIELD: &str = "message-textarea";

/// Destination URL per form kind. Kinds without an entry have no fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackTargets {
    urls: BTreeMap<FormKind, String>,
}

impl FallbackTargets {
    pub fn insert(&mut self, kind: FormKind, url: impl Into<String>) {
        self.urls.insert(kind, url.into());
    }

    pub fn with(mut self, kind: FormKind, url: impl Into<String>) -> Self {
        self.insert(kind, url);
        self
    }

    pub fn url_for(&self, kind: &str) -> Option<&str> {
        FormKind::parse(kind)
            .and_then(|kind| self.urls.get(&kind))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = FormKind> + '_ {
        self.urls.keys().copied()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("form_kind is required")]
    MissingFormKind,
    #[error("attachment '{file_name}' has an invalid content type: {source}")]
    AttachmentType {
        file_name: String,
        source: reqwest::Error,
    },
    #[error("fallback request for {kind} failed: {source}")]
    Transport { kind: String, source: reqwest::Error },
}

/// Body re-encoded to match the way the browser originally sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackBody {
    UrlEncoded(String),
    Json(Value),
    Multipart(Vec<(String, FieldValue)>),
}

impl FallbackBody {
    pub fn build(kind: &str, submission: &Submission) -> Self {
        match submission.encoding() {
            SubmissionEncoding::UrlEncoded => {
                let mut serializer = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in submission.fields() {
                    if let FieldValue::Text(text) = value {
                        serializer.append_pair(key, text);
                    }
                }
                FallbackBody::UrlEncoded(serializer.finish())
            }
            SubmissionEncoding::Json => {
                let mut object = Map::new();
                for (key, value) in submission.fields() {
                    if let FieldValue::Text(text) = value {
                        object
                            .entry(key.clone())
                            .or_insert_with(|| Value::String(text.clone()));
                    }
                }
                FallbackBody::Json(Value::Object(object))
            }
            SubmissionEncoding::Multipart => {
                let mut parts = submission.fields().to_vec();
                if FormKind::parse(kind) == Some(FormKind::ContractInquiry)
                    && !parts.iter().any(|(key, _)| key == LEGACY_MESSAGE_FIELD)
                {
                    let message = parts.iter().find_map(|(key, value)| match value {
                        FieldValue::Text(text) if key == "message" => Some(text.clone()),
                        _ => None,
                    });
                    if let Some(message) = message {
                        parts.push((LEGACY_MESSAGE_FIELD.to_string(), FieldValue::Text(message)));
                    }
                }
                FallbackBody::Multipart(parts)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackSubmitter {
    http: reqwest::Client,
    targets: Arc<FallbackTargets>,
}

impl FallbackSubmitter {
    pub fn new(http: reqwest::Client, targets: FallbackTargets) -> Self {
        Self {
            http,
            targets: Arc::new(targets),
        }
    }

    /// `Ok(false)` when the kind has no fallback destination or the destination
    /// answered outside 2xx/3xx.
    pub async fn submit(
        &self,
        kind: Option<&str>,
        submission: &Submission,
    ) -> Result<bool, FallbackError> {
        let kind = kind
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .ok_or(FallbackError::MissingFormKind)?;

        let Some(url) = self.targets.url_for(kind) else {
            tracing::debug!(form_kind = kind, "no fallback destination configured");
            return Ok(false);
        };

        let request = match FallbackBody::build(kind, submission) {
            FallbackBody::UrlEncoded(body) => self
                .http
                .post(url)
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(body),
            FallbackBody::Json(body) => self.http.post(url).json(&body),
            FallbackBody::Multipart(parts) => self.http.post(url).multipart(multipart_form(parts)?),
        };

        let response = request
            .send()
            .await
            .map_err(|source| FallbackError::Transport {
                kind: kind.to_string(),
                source,
            })?;

        let status = response.status();
        let delivered = status.is_success() || status.is_redirection();
        if delivered {
            tracing::info!(form_kind = kind, %status, "fallback submission delivered");
        } else {
            tracing::warn!(form_kind = kind, %status, "fallback submission rejected");
        }
        Ok(delivered)
    }
}

fn multipart_form(parts: Vec<(String, FieldValue)>) -> Result<Form, FallbackError> {
    parts
        .into_iter()
        .try_fold(Form::new(), |form, (key, value)| match value {
            FieldValue::Text(text) => Ok(form.text(key, text)),
            FieldValue::File(attachment) => {
                let part = Part::bytes(attachment.data.to_vec())
                    .file_name(attachment.file_name.clone())
                    .mime_str(&attachment.content_type)
                    .map_err(|source| FallbackError::AttachmentType {
                        file_name: attachment.file_name.clone(),
                        source,
                    })?;
                Ok(form.part(key, part))
            }
        })
}
