use serde::Deserialize;

pub const DEFAULT_VERIFY_URL: &str = "https://challenges.cloudflare.com/turnstile/v0/siteverify";

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Confirms a client-supplied challenge token with the verification service.
#[derive(Debug, Clone)]
pub struct ChallengeVerifier {
    http: reqwest::Client,
    verify_url: String,
}

impl ChallengeVerifier {
    pub fn new(http: reqwest::Client, verify_url: impl Into<String>) -> Self {
        Self {
            http,
            verify_url: verify_url.into(),
        }
    }

    /// Any transport failure, non-2xx status or unparseable body counts as a
    /// failed verification.
    pub async fn verify(&self, secret: &str, token: &str, client_ip: Option<&str>) -> bool {
        if token.trim().is_empty() {
            return false;
        }

        let mut form = vec![("secret", secret), ("response", token)];
        if let Some(ip) = client_ip {
            form.push(("remoteip", ip));
        }

        let response = match self.http.post(&self.verify_url).form(&form).send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "challenge verification request failed");
                return false;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "challenge verification rejected");
            return false;
        }

        match response.json::<SiteVerifyResponse>().await {
            Ok(body) if body.success == Some(true) => true,
            Ok(body) => {
                tracing::info!(error_codes = ?body.error_codes, "challenge token not accepted");
                false
            }
            Err(err) => {
                tracing::warn!(error = %err, "challenge verification body unreadable");
                false
            }
        }
    }
}
