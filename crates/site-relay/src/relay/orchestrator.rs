//! Sequences verification, fallback delivery and the system-of-record write
//! for a single submission.

use std::sync::Arc;

use url::Url;

use super::background::BackgroundTasks;
use super::domain::{
    RequestMeta, SubmissionOutcome, CHALLENGE_TOKEN_FIELD, DEFAULT_REDIRECT_PATH, REDIRECT_FIELD,
};
use super::fallback::FallbackSubmitter;
use super::submission::Submission;
use super::system_of_record::SystemOfRecordSubmitter;
use super::verifier::ChallengeVerifier;
use crate::config::RelayConfig;

/// How a processed submission should be answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionDisposition {
    /// Challenge verification was required and did not pass.
    ChallengeFailed,
    /// Neither delivery path accepted the submission.
    Failed(SubmissionOutcome),
    Accepted {
        outcome: SubmissionOutcome,
        location: Url,
    },
}

pub struct SubmissionOrchestrator {
    verifier: ChallengeVerifier,
    turnstile_secret: Option<String>,
    fallback: FallbackSubmitter,
    system_of_record: SystemOfRecordSubmitter,
    background: Option<Arc<dyn BackgroundTasks>>,
}

impl SubmissionOrchestrator {
    pub fn new(
        verifier: ChallengeVerifier,
        turnstile_secret: Option<String>,
        fallback: FallbackSubmitter,
        system_of_record: SystemOfRecordSubmitter,
    ) -> Self {
        Self {
            verifier,
            turnstile_secret,
            fallback,
            system_of_record,
            background: None,
        }
    }

    pub fn from_config(config: &RelayConfig, http: reqwest::Client) -> Self {
        Self::new(
            ChallengeVerifier::new(http.clone(), config.turnstile.verify_url.clone()),
            config.turnstile.secret.clone(),
            FallbackSubmitter::new(http.clone(), config.fallback.clone()),
            SystemOfRecordSubmitter::new(http, config.erpnext.clone()),
        )
    }

    /// Lets the system-of-record write run after the response once the
    /// fallback has already delivered.
    pub fn with_background(mut self, background: Arc<dyn BackgroundTasks>) -> Self {
        self.background = Some(background);
        self
    }

    pub async fn process(&self, submission: Submission, meta: RequestMeta) -> SubmissionDisposition {
        if let Some(secret) = self.turnstile_secret.as_deref() {
            let token = submission.text(CHALLENGE_TOKEN_FIELD).unwrap_or_default();
            if !self
                .verifier
                .verify(secret, token, meta.client_ip.as_deref())
                .await
            {
                tracing::info!(client_ip = ?meta.client_ip, "submission failed challenge verification");
                return SubmissionDisposition::ChallengeFailed;
            }
        }

        let kind = submission.form_kind().map(str::to_string);

        let fallback_ok = match self.fallback.submit(kind.as_deref(), &submission).await {
            Ok(delivered) => delivered,
            Err(err) => {
                tracing::warn!(error = %err, form_kind = ?kind, "fallback submission failed");
                false
            }
        };

        let system_of_record_ok = match (&self.background, fallback_ok) {
            (Some(background), true) => {
                let submitter = self.system_of_record.clone();
                let task_kind = kind.clone();
                let submission = submission.clone();
                let meta = meta.clone();
                background.defer(
                    "system_of_record",
                    Box::pin(async move {
                        if let Err(err) = submitter
                            .submit(&meta, task_kind.as_deref(), &submission)
                            .await
                        {
                            tracing::error!(error = %err, form_kind = ?task_kind, "deferred system-of-record submission failed");
                        }
                    }),
                );
                tracing::debug!(form_kind = ?kind, "system-of-record submission deferred");
                true
            }
            _ => match self
                .system_of_record
                .submit(&meta, kind.as_deref(), &submission)
                .await
            {
                Ok(()) => true,
                Err(err) if err.is_configuration() => {
                    tracing::warn!(error = %err, form_kind = ?kind, "system-of-record submission not attempted");
                    false
                }
                Err(err) => {
                    tracing::error!(error = %err, form_kind = ?kind, "system-of-record submission failed");
                    false
                }
            },
        };

        let outcome = SubmissionOutcome {
            fallback_ok,
            system_of_record_ok,
        };
        if !outcome.is_success() {
            return SubmissionDisposition::Failed(outcome);
        }

        SubmissionDisposition::Accepted {
            outcome,
            location: redirect_target(&meta.origin, submission.text(REDIRECT_FIELD)),
        }
    }
}

/// Resolves the requested post-submit path against the caller's own origin.
/// Only the path, query and fragment are kept, so an absolute URL naming
/// another host still lands on `origin`.
pub fn redirect_target(origin: &Url, requested: Option<&str>) -> Url {
    let requested = requested
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_REDIRECT_PATH);

    let resolved = origin
        .join(requested)
        .or_else(|_| origin.join(DEFAULT_REDIRECT_PATH));

    let mut target = origin.clone();
    match resolved {
        Ok(resolved) if !resolved.cannot_be_a_base() => {
            target.set_path(resolved.path());
            target.set_query(resolved.query());
            target.set_fragment(resolved.fragment());
        }
        _ => target.set_path(DEFAULT_REDIRECT_PATH),
    }
    target
}
