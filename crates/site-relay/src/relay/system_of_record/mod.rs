//! ERPNext as the system of record: one Lead or Job Applicant per submission,
//! annotated with a Comment and, for applications, an optional resume.

pub mod attachment;
pub mod client;
pub mod schema;

use std::fmt;
use std::sync::Arc;

pub use attachment::{validate_resume, AttachmentError, ALLOWED_RESUME_TYPES, MAX_RESUME_BYTES};
pub use client::ErpNextClient;

use super::domain::{FormFamily, FormKind, RequestMeta};
use super::submission::Submission;

/// Form field carrying the applicant's resume upload.
pub const RESUME_FIELD: &str = "resume";

#[derive(Clone, Default)]
pub struct ErpNextSettings {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub lead_doctype: String,
    pub applicant_doctype: String,
    pub access_client_id: Option<String>,
    pub access_client_secret: Option<String>,
}

impl fmt::Debug for ErpNextSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("ErpNextSettings")
            .field("base_url", &self.base_url)
            .field("api_token", &redacted(&self.api_token))
            .field("api_key", &self.api_key)
            .field("api_secret", &redacted(&self.api_secret))
            .field("lead_doctype", &self.lead_doctype)
            .field("applicant_doctype", &self.applicant_doctype)
            .field("access_client_id", &self.access_client_id)
            .field("access_client_secret", &redacted(&self.access_client_secret))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SystemOfRecordError {
    #[error("form_kind is required")]
    MissingFormKind,
    #[error("unsupported form kind: {0}")]
    UnsupportedFormKind(String),
    #[error("ERPNEXT_BASE_URL is not configured")]
    MissingBaseUrl,
    #[error("ERPNEXT_BASE_URL '{0}' is not a usable base URL")]
    InvalidBaseUrl(String),
    #[error("ERPNext credentials missing: set ERPNEXT_API_TOKEN or ERPNEXT_API_KEY and ERPNEXT_API_SECRET")]
    MissingCredentials,
    #[error("ERPNext credentials contain characters that are not valid in a header")]
    InvalidCredentials,
    #[error("ERPNext rejected {doctype} (HTTP {status}): {message}")]
    Rejected {
        doctype: String,
        status: u16,
        message: String,
    },
    #[error("ERPNext created {doctype} without returning its name")]
    MissingRecordName { doctype: String },
    #[error("ERPNext request for {doctype} failed: {source}")]
    Transport {
        doctype: String,
        source: reqwest::Error,
    },
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}

impl SystemOfRecordError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SystemOfRecordError::MissingFormKind
                | SystemOfRecordError::UnsupportedFormKind(_)
                | SystemOfRecordError::MissingBaseUrl
                | SystemOfRecordError::InvalidBaseUrl(_)
                | SystemOfRecordError::MissingCredentials
                | SystemOfRecordError::InvalidCredentials
        )
    }
}

#[derive(Debug, Clone)]
pub struct SystemOfRecordSubmitter {
    http: reqwest::Client,
    settings: Arc<ErpNextSettings>,
}

impl SystemOfRecordSubmitter {
    pub fn new(http: reqwest::Client, settings: ErpNextSettings) -> Self {
        Self {
            http,
            settings: Arc::new(settings),
        }
    }

    /// Creates the base record, its Comment and (for applications) uploads the
    /// resume. An attachment failure leaves the record and Comment in place.
    pub async fn submit(
        &self,
        meta: &RequestMeta,
        kind: Option<&str>,
        submission: &Submission,
    ) -> Result<(), SystemOfRecordError> {
        let raw_kind = kind
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .ok_or(SystemOfRecordError::MissingFormKind)?;
        let kind = FormKind::parse(raw_kind)
            .ok_or_else(|| SystemOfRecordError::UnsupportedFormKind(raw_kind.to_string()))?;

        let client = ErpNextClient::from_settings(self.http.clone(), &self.settings)?;

        match kind.family() {
            FormFamily::Inquiry => self.submit_inquiry(&client, kind, meta, submission).await,
            FormFamily::Application => {
                self.submit_application(&client, kind, meta, submission)
                    .await
            }
        }
    }

    async fn submit_inquiry(
        &self,
        client: &ErpNextClient,
        kind: FormKind,
        meta: &RequestMeta,
        submission: &Submission,
    ) -> Result<(), SystemOfRecordError> {
        let doctype = self.settings.lead_doctype.as_str();
        let name = client
            .create_resource(doctype, &schema::lead_document(submission))
            .await?;

        let content = schema::inquiry_comment(kind, submission, meta);
        client
            .create_resource(
                schema::COMMENT_DOCTYPE,
                &schema::comment_document(doctype, &name, &content),
            )
            .await?;

        tracing::info!(form_kind = %kind, doctype, record = %name, "inquiry recorded");
        Ok(())
    }

    async fn submit_application(
        &self,
        client: &ErpNextClient,
        kind: FormKind,
        meta: &RequestMeta,
        submission: &Submission,
    ) -> Result<(), SystemOfRecordError> {
        let doctype = self.settings.applicant_doctype.as_str();
        let name = client
            .create_resource(doctype, &schema::applicant_document(submission))
            .await?;

        let content = schema::application_comment(kind, submission, meta);
        client
            .create_resource(
                schema::COMMENT_DOCTYPE,
                &schema::comment_document(doctype, &name, &content),
            )
            .await?;

        if let Some(resume) = submission.attachment(RESUME_FIELD) {
            validate_resume(resume)?;
            client.upload_file(doctype, &name, resume).await?;
            tracing::info!(record = %name, size = resume.size(), "resume attached");
        }

        tracing::info!(form_kind = %kind, doctype, record = %name, "application recorded");
        Ok(())
    }
}
