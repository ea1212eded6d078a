use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::relay::domain::FormKind;
use crate::relay::fallback::FallbackTargets;
use crate::relay::system_of_record::ErpNextSettings;
use crate::relay::verifier::DEFAULT_VERIFY_URL;
use crate::site::cors::AllowedOrigins;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub site: SiteConfig,
    pub relay: RelayConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            site: SiteConfig::from_env(),
            relay: RelayConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Static site serving: asset directory, CORS allow-list and the HTML site key.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub assets_dir: PathBuf,
    pub allowed_origins: AllowedOrigins,
    pub turnstile_site_key: String,
}

impl SiteConfig {
    fn from_env() -> Self {
        Self {
            assets_dir: PathBuf::from(
                non_empty_var("ASSETS_DIR").unwrap_or_else(|| "public".to_string()),
            ),
            allowed_origins: AllowedOrigins::parse(
                &non_empty_var("ALLOWED_ORIGINS").unwrap_or_default(),
            ),
            turnstile_site_key: non_empty_var("TURNSTILE_SITE_KEY").unwrap_or_default(),
        }
    }
}

/// Everything the submission relay needs to reach its three upstreams.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub turnstile: TurnstileConfig,
    pub fallback: FallbackTargets,
    pub erpnext: ErpNextSettings,
    pub defer_system_of_record: bool,
}

impl RelayConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut fallback = FallbackTargets::default();
        for kind in FormKind::ALL {
            let key = format!("FALLBACK_URL_{}", kind.as_str().to_ascii_uppercase());
            if let Some(url) = non_empty_var(&key) {
                fallback.insert(kind, url);
            }
        }

        let erpnext = ErpNextSettings {
            base_url: non_empty_var("ERPNEXT_BASE_URL"),
            api_token: non_empty_var("ERPNEXT_API_TOKEN"),
            api_key: non_empty_var("ERPNEXT_API_KEY"),
            api_secret: non_empty_var("ERPNEXT_API_SECRET"),
            lead_doctype: non_empty_var("ERPNEXT_LEAD_DOCTYPE")
                .unwrap_or_else(|| "Lead".to_string()),
            applicant_doctype: non_empty_var("ERPNEXT_APPLICANT_DOCTYPE")
                .unwrap_or_else(|| "Job Applicant".to_string()),
            access_client_id: non_empty_var("CF_ACCESS_CLIENT_ID"),
            access_client_secret: non_empty_var("CF_ACCESS_CLIENT_SECRET"),
        };

        let defer_system_of_record = match non_empty_var("RELAY_DEFER_SYSTEM_OF_RECORD") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                key: "RELAY_DEFER_SYSTEM_OF_RECORD",
                value: raw,
            })?,
            None => true,
        };

        Ok(Self {
            turnstile: TurnstileConfig {
                secret: non_empty_var("TURNSTILE_SECRET"),
                verify_url: non_empty_var("TURNSTILE_VERIFY_URL")
                    .unwrap_or_else(|| DEFAULT_VERIFY_URL.to_string()),
            },
            fallback,
            erpnext,
            defer_system_of_record,
        })
    }
}

/// Challenge verification is only enforced when a secret is present.
#[derive(Clone)]
pub struct TurnstileConfig {
    pub secret: Option<String>,
    pub verify_url: String,
}

impl fmt::Debug for TurnstileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnstileConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("verify_url", &self.verify_url)
            .finish()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidFlag { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidFlag { key, value } => {
                write!(f, "{key} must be a boolean (true/false), found '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidFlag { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
