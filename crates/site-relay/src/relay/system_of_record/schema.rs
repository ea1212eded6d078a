//! Maps website form fields onto ERPNext documents.

use serde_json::{json, Map, Value};

use crate::relay::domain::{FormKind, RequestMeta};
use crate::relay::submission::Submission;

pub const COMMENT_DOCTYPE: &str = "Comment";
pub const DEFAULT_LEAD_NAME: &str = "Website Inquiry";
pub const DEFAULT_APPLICANT_NAME: &str = "Website Applicant";

const INQUIRY_FIELDS: &[(&str, &str)] = &[
    ("Position", "position"),
    ("Roles Hiring For", "roles_hiring_for"),
    ("Salary Range", "salary_range"),
    ("Rate Range", "rate_range"),
    ("Engagement Type", "engagement_type"),
    ("Weekly Hours", "weekly_hours"),
    ("Duration", "duration"),
    ("Location", "location"),
    ("Role Type", "role_type"),
];

const APPLICATION_FIELDS: &[(&str, &str)] = &[
    ("Role of Interest", "role_interest"),
    ("Job Title", "job_title"),
    ("Resume URL", "resume_url"),
    ("Cover Letter", "cover_letter"),
];

pub fn lead_document(submission: &Submission) -> Value {
    let contact = submission
        .text("name")
        .or_else(|| submission.text("contact_name"));
    let company = submission.text("company");
    let lead_name = contact.or(company).unwrap_or(DEFAULT_LEAD_NAME);

    let mut document = Map::new();
    document.insert("lead_name".to_string(), json!(lead_name));
    insert_present(&mut document, "company_name", company);
    insert_present(&mut document, "email_id", submission.text("email"));
    insert_present(&mut document, "phone", submission.text("phone"));
    Value::Object(document)
}

pub fn applicant_document(submission: &Submission) -> Value {
    let applicant_name = submission
        .text("name")
        .map(str::to_string)
        .or_else(|| {
            let joined = [submission.text("first_name"), submission.text("last_name")]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!joined.is_empty()).then_some(joined)
        })
        .unwrap_or_else(|| DEFAULT_APPLICANT_NAME.to_string());

    let mut document = Map::new();
    document.insert("applicant_name".to_string(), json!(applicant_name));
    insert_present(&mut document, "email_id", submission.text("email"));
    insert_present(&mut document, "phone_number", submission.text("phone"));
    Value::Object(document)
}

pub fn inquiry_comment(kind: FormKind, submission: &Submission, meta: &RequestMeta) -> String {
    let message = submission
        .text("message")
        .or_else(|| submission.text("message-textarea"));

    let mut lines = vec![("Form", Some(kind.as_str()))];
    lines.extend(
        INQUIRY_FIELDS
            .iter()
            .map(|(label, key)| (*label, submission.text(key))),
    );
    lines.push(("Message", message));
    lines.push(("IP", meta.client_ip.as_deref()));
    lines.push(("User Agent", meta.user_agent.as_deref()));
    render_lines(lines)
}

pub fn application_comment(kind: FormKind, submission: &Submission, meta: &RequestMeta) -> String {
    let mut lines = vec![("Form", Some(kind.as_str()))];
    lines.extend(
        APPLICATION_FIELDS
            .iter()
            .map(|(label, key)| (*label, submission.text(key))),
    );
    lines.push(("IP", meta.client_ip.as_deref()));
    lines.push(("User Agent", meta.user_agent.as_deref()));
    render_lines(lines)
}

pub fn comment_document(reference_doctype: &str, reference_name: &str, content: &str) -> Value {
    json!({
        "comment_type": "Comment",
        "reference_doctype": reference_doctype,
        "reference_name": reference_name,
        "content": content,
    })
}

fn render_lines(lines: Vec<(&str, Option<&str>)>) -> String {
    lines
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| format!("{label}: {value}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn insert_present(document: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        document.insert(key.to_string(), json!(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::submission::SubmissionEncoding;
    use url::Url;

    fn meta() -> RequestMeta {
        RequestMeta {
            client_ip: Some("203.0.113.7".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
            origin: Url::parse("https://www.example.com/").expect("url"),
        }
    }

    #[test]
    fn lead_prefers_contact_then_company_then_default() {
        let named = Submission::new(SubmissionEncoding::UrlEncoded)
            .with_text("name", "Grace Hopper")
            .with_text("company", "Navy")
            .with_text("email", "grace@example.com");
        assert_eq!(
            lead_document(&named),
            json!({
                "lead_name": "Grace Hopper",
                "company_name": "Navy",
                "email_id": "grace@example.com",
            })
        );

        let company_only = Submission::new(SubmissionEncoding::UrlEncoded)
            .with_text("name", "  ")
            .with_text("company", "Navy");
        assert_eq!(lead_document(&company_only)["lead_name"], "Navy");

        let anonymous = Submission::new(SubmissionEncoding::UrlEncoded);
        assert_eq!(lead_document(&anonymous), json!({ "lead_name": "Website Inquiry" }));
    }

    #[test]
    fn applicant_name_falls_back_to_split_names_then_default() {
        let split = Submission::new(SubmissionEncoding::Multipart)
            .with_text("first_name", "Ada")
            .with_text("last_name", "Lovelace")
            .with_text("phone", "555-0100");
        assert_eq!(
            applicant_document(&split),
            json!({ "applicant_name": "Ada Lovelace", "phone_number": "555-0100" })
        );

        let anonymous = Submission::new(SubmissionEncoding::Multipart);
        assert_eq!(
            applicant_document(&anonymous)["applicant_name"],
            "Website Applicant"
        );
    }

    #[test]
    fn inquiry_comment_lists_only_present_fields() {
        let submission = Submission::new(SubmissionEncoding::UrlEncoded)
            .with_text("position", "Staff Engineer")
            .with_text("rate_range", "")
            .with_text("weekly_hours", "40")
            .with_text("message-textarea", "Let's talk");

        let content = inquiry_comment(FormKind::ContractInquiry, &submission, &meta());

        assert_eq!(
            content,
            "Form: contract_inquiry\nPosition: Staff Engineer\nWeekly Hours: 40\nMessage: Let's talk\nIP: 203.0.113.7\nUser Agent: Mozilla/5.0"
        );
    }

    #[test]
    fn application_comment_omits_missing_meta() {
        let submission = Submission::new(SubmissionEncoding::Json)
            .with_text("job_title", "Data Engineer")
            .with_text("cover_letter", "Hello there");
        let meta = RequestMeta {
            client_ip: None,
            user_agent: None,
            origin: Url::parse("http://localhost/").expect("url"),
        };

        let content = application_comment(FormKind::JobApplication, &submission, &meta);

        assert_eq!(
            content,
            "Form: job_application\nJob Title: Data Engineer\nCover Letter: Hello there"
        );
    }
}
