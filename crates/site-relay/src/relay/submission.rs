//! One polymorphic form payload regardless of how the browser encoded it.

use axum::body::{to_bytes, Bytes};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, StatusCode};
use serde_json::Value;

use super::domain::FORM_KIND_FIELD;

/// Largest inbound submission body accepted, attachments included.
pub const MAX_SUBMISSION_BYTES: usize = 25 * 1024 * 1024;

/// Wire encoding the submission arrived in; the fallback path mirrors it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionEncoding {
    UrlEncoded,
    Multipart,
    Json,
}

impl SubmissionEncoding {
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, SubmissionParseError> {
        let raw = content_type.unwrap_or_default();
        let parsed: mime::Mime = raw
            .parse()
            .map_err(|_| SubmissionParseError::UnsupportedMediaType(raw.to_string()))?;

        match parsed.essence_str() {
            "application/x-www-form-urlencoded" => Ok(Self::UrlEncoded),
            "multipart/form-data" => Ok(Self::Multipart),
            "application/json" => Ok(Self::Json),
            other => Err(SubmissionParseError::UnsupportedMediaType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(Attachment),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            FieldValue::File(_) => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionParseError {
    #[error("unsupported content type '{0}'")]
    UnsupportedMediaType(String),
    #[error("failed to read request body: {0}")]
    Body(String),
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json body must be an object")]
    NotAnObject,
    #[error("invalid multipart body: {0}")]
    Multipart(String),
}

impl SubmissionParseError {
    pub fn status(&self) -> StatusCode {
        match self {
            SubmissionParseError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Ordered field list; duplicate keys are kept and lookups return the first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    encoding: SubmissionEncoding,
    fields: Vec<(String, FieldValue)>,
}

impl Submission {
    pub fn new(encoding: SubmissionEncoding) -> Self {
        Self {
            encoding,
            fields: Vec::new(),
        }
    }

    pub fn with_text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_text(key, value);
        self
    }

    pub fn with_file(mut self, key: impl Into<String>, attachment: Attachment) -> Self {
        self.fields.push((key.into(), FieldValue::File(attachment)));
        self
    }

    pub fn push_text(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), FieldValue::Text(value.into())));
    }

    pub fn encoding(&self) -> SubmissionEncoding {
        self.encoding
    }

    pub fn fields(&self) -> &[(String, FieldValue)] {
        &self.fields
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Trimmed text value; blank and file values read as absent.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(FieldValue::as_text)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn attachment(&self, key: &str) -> Option<&Attachment> {
        match self.get(key) {
            Some(FieldValue::File(attachment)) => Some(attachment),
            _ => None,
        }
    }

    pub fn form_kind(&self) -> Option<&str> {
        self.text(FORM_KIND_FIELD)
    }

    pub async fn from_request(request: Request) -> Result<Self, SubmissionParseError> {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match SubmissionEncoding::from_content_type(content_type.as_deref())? {
            SubmissionEncoding::Multipart => {
                let multipart = Multipart::from_request(request, &())
                    .await
                    .map_err(|rejection| SubmissionParseError::Multipart(rejection.body_text()))?;
                Self::from_multipart(multipart).await
            }
            SubmissionEncoding::UrlEncoded => {
                let body = read_body(request).await?;
                Ok(Self::from_urlencoded(&body))
            }
            SubmissionEncoding::Json => {
                let body = read_body(request).await?;
                Self::from_json(&body)
            }
        }
    }

    pub fn from_urlencoded(body: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), FieldValue::Text(value.into_owned())))
            .collect();
        Self {
            encoding: SubmissionEncoding::UrlEncoded,
            fields,
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self, SubmissionParseError> {
        let Value::Object(object) = serde_json::from_slice::<Value>(body)? else {
            return Err(SubmissionParseError::NotAnObject);
        };

        let fields = object
            .into_iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    Value::Null => return None,
                    Value::String(text) => text,
                    Value::Bool(flag) => flag.to_string(),
                    Value::Number(number) => number.to_string(),
                    nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
                };
                Some((key, FieldValue::Text(text)))
            })
            .collect();

        Ok(Self {
            encoding: SubmissionEncoding::Json,
            fields,
        })
    }

    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, SubmissionParseError> {
        let mut fields = Vec::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| SubmissionParseError::Multipart(err.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|err| SubmissionParseError::Multipart(err.to_string()))?;
                    // "No file chosen" arrives as an empty, unnamed file part.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    fields.push((
                        name,
                        FieldValue::File(Attachment {
                            file_name,
                            content_type,
                            data,
                        }),
                    ));
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|err| SubmissionParseError::Multipart(err.to_string()))?;
                    fields.push((name, FieldValue::Text(text)));
                }
            }
        }

        Ok(Self {
            encoding: SubmissionEncoding::Multipart,
            fields,
        })
    }
}

async fn read_body(request: Request) -> Result<Bytes, SubmissionParseError> {
    to_bytes(request.into_body(), MAX_SUBMISSION_BYTES)
        .await
        .map_err(|err| SubmissionParseError::Body(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(content_type: Option<&str>, body: impl Into<Body>) -> Request {
        let mut builder = axum::http::Request::post("/api/forms/submit");
        if let Some(content_type) = content_type {
            builder = builder.header(header::CONTENT_TYPE, content_type);
        }
        builder.body(body.into()).expect("request builds")
    }

    #[test]
    fn classifies_content_types_by_essence() {
        assert_eq!(
            SubmissionEncoding::from_content_type(Some(
                "application/x-www-form-urlencoded; charset=UTF-8"
            ))
            .expect("urlencoded"),
            SubmissionEncoding::UrlEncoded
        );
        assert_eq!(
            SubmissionEncoding::from_content_type(Some("multipart/form-data; boundary=x"))
                .expect("multipart"),
            SubmissionEncoding::Multipart
        );
        let err = SubmissionEncoding::from_content_type(Some("text/plain")).expect_err("415");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let err = SubmissionEncoding::from_content_type(None).expect_err("415");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn urlencoded_keeps_order_and_first_duplicate_wins() {
        let submission =
            Submission::from_urlencoded(b"form_kind=contract_inquiry&name=Ada+Lovelace&name=Other&blank=%20");

        assert_eq!(submission.form_kind(), Some("contract_inquiry"));
        assert_eq!(submission.text("name"), Some("Ada Lovelace"));
        assert_eq!(submission.fields().len(), 4);
        assert!(submission.contains("blank"));
        assert_eq!(submission.text("blank"), None);
    }

    #[test]
    fn json_values_are_flattened_to_text() {
        let submission = Submission::from_json(
            br#"{"form_kind":"job_application","hours":40,"remote":true,"skip":null,"tags":["a","b"]}"#,
        )
        .expect("json parses");

        assert_eq!(submission.encoding(), SubmissionEncoding::Json);
        assert_eq!(submission.text("hours"), Some("40"));
        assert_eq!(submission.text("remote"), Some("true"));
        assert_eq!(submission.get("skip"), None);
        assert_eq!(submission.text("tags"), Some(r#"["a","b"]"#));
    }

    #[test]
    fn json_arrays_are_rejected() {
        let err = Submission::from_json(b"[1,2]").expect_err("not an object");
        assert!(matches!(err, SubmissionParseError::NotAnObject));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = Submission::from_json(b"{not json").expect_err("malformed");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn multipart_separates_files_from_text() {
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"form_kind\"\r\n\r\n",
            "candidate_application\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"resume\"; filename=\"cv.pdf\"\r\n",
            "Content-Type: application/pdf\r\n\r\n",
            "%PDF-1.4\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"portfolio\"; filename=\"\"\r\n",
            "Content-Type: application/octet-stream\r\n\r\n",
            "\r\n",
            "--XBOUNDARY--\r\n",
        );

        let submission = Submission::from_request(request(
            Some("multipart/form-data; boundary=XBOUNDARY"),
            body,
        ))
        .await
        .expect("multipart parses");

        assert_eq!(submission.encoding(), SubmissionEncoding::Multipart);
        assert_eq!(submission.form_kind(), Some("candidate_application"));
        let resume = submission.attachment("resume").expect("resume attached");
        assert_eq!(resume.file_name, "cv.pdf");
        assert_eq!(resume.content_type, "application/pdf");
        assert_eq!(resume.data, Bytes::from_static(b"%PDF-1.4"));
        assert!(submission.attachment("portfolio").is_none());
    }

    #[tokio::test]
    async fn from_request_dispatches_on_content_type() {
        let submission = Submission::from_request(request(
            Some("application/json"),
            r#"{"form_kind":"employer_inquiry"}"#,
        ))
        .await
        .expect("json parses");
        assert_eq!(submission.form_kind(), Some("employer_inquiry"));

        let err = Submission::from_request(request(Some("text/csv"), "a,b"))
            .await
            .expect_err("unsupported");
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
