//! Form-submission relay: parses a website form post, optionally verifies its
//! challenge token, then delivers it to the backup form service and to
//! ERPNext. The caller succeeds when at least one of the two accepts it.

pub mod background;
pub mod domain;
pub mod fallback;
pub mod orchestrator;
pub mod router;
pub mod submission;
pub mod system_of_record;
pub mod verifier;

#[cfg(test)]
mod tests;

pub use background::{BackgroundTasks, DeferredTask, TokioBackgroundTasks};
pub use domain::{FormFamily, FormKind, RequestMeta, SubmissionOutcome};
pub use fallback::{FallbackError, FallbackSubmitter, FallbackTargets};
pub use orchestrator::{redirect_target, SubmissionDisposition, SubmissionOrchestrator};
pub use router::{relay_router, SUBMIT_PATH};
pub use submission::{
    Attachment, FieldValue, Submission, SubmissionEncoding, SubmissionParseError,
    MAX_SUBMISSION_BYTES,
};
pub use system_of_record::{ErpNextSettings, SystemOfRecordError, SystemOfRecordSubmitter};
pub use verifier::ChallengeVerifier;

/// Shared outbound client. Redirects are never followed so a 3xx from the
/// fallback service counts as delivery rather than being chased.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
}
