use std::fmt;

use axum::http::{header, HeaderMap};
use url::Url;

/// Discriminator field every website form carries.
pub const FORM_KIND_FIELD: &str = "form_kind";
/// Field holding the client-side challenge token.
pub const CHALLENGE_TOKEN_FIELD: &str = "cf-turnstile-response";
/// Optional post-submit destination supplied by the form.
pub const REDIRECT_FIELD: &str = "redirect";
pub const DEFAULT_REDIRECT_PATH: &str = "/thanks";

/// Website forms the relay knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormKind {
    ContractInquiry,
    FulltimeInquiry,
    EmployerInquiry,
    CandidateApplication,
    JobApplication,
}

/// Schema family in the system of record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormFamily {
    Inquiry,
    Application,
}

impl FormKind {
    pub const ALL: [FormKind; 5] = [
        FormKind::ContractInquiry,
        FormKind::FulltimeInquiry,
        FormKind::EmployerInquiry,
        FormKind::CandidateApplication,
        FormKind::JobApplication,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormKind::ContractInquiry => "contract_inquiry",
            FormKind::FulltimeInquiry => "fulltime_inquiry",
            FormKind::EmployerInquiry => "employer_inquiry",
            FormKind::CandidateApplication => "candidate_application",
            FormKind::JobApplication => "job_application",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }

    pub fn family(self) -> FormFamily {
        match self {
            FormKind::ContractInquiry | FormKind::FulltimeInquiry | FormKind::EmployerInquiry => {
                FormFamily::Inquiry
            }
            FormKind::CandidateApplication | FormKind::JobApplication => FormFamily::Application,
        }
    }
}

impl fmt::Display for FormKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which delivery paths accepted a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubmissionOutcome {
    pub fallback_ok: bool,
    pub system_of_record_ok: bool,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        self.fallback_ok || self.system_of_record_ok
    }
}

/// Caller details captured from the inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub origin: Url,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let client_ip = header_text(headers, "cf-connecting-ip").or_else(|| {
            header_text(headers, "x-forwarded-for").and_then(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .find(|entry| !entry.is_empty())
                    .map(str::to_string)
            })
        });
        let user_agent = header_text(headers, header::USER_AGENT.as_str());

        let scheme = header_text(headers, "x-forwarded-proto")
            .filter(|proto| proto == "http" || proto == "https")
            .unwrap_or_else(|| "http".to_string());
        let host = header_text(headers, header::HOST.as_str())
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            client_ip,
            user_agent,
            origin: origin_url(&scheme, &host),
        }
    }
}

fn origin_url(scheme: &str, host: &str) -> Url {
    Url::parse(&format!("{scheme}://{host}/"))
        .ok()
        .filter(|url| url.path() == "/" && url.query().is_none())
        .unwrap_or_else(|| Url::parse("http://localhost/").expect("static url parses"))
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
