use crate::domain::model::GeoPoint;
use crate::utils::error::{PlatformError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// Full application configuration, usually loaded from `stray-safe.toml`.
/// Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub platform: PlatformSection,
    pub storage: StorageSection,
    pub geocoding: GeocodingSection,
    pub routing: RoutingSection,
    pub notifications: NotificationsSection,
    pub admin: AdminSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSection {
    pub name: String,
    pub city_center: GeoPoint,
    pub notify_concurrency: usize,
}

impl Default for PlatformSection {
    fn default() -> Self {
        Self {
            name: "StraySafe".to_string(),
            city_center: GeoPoint {
                lat: 13.0827,
                lon: 80.2707,
            },
            notify_concurrency: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodingSection {
    pub enabled: bool,
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub min_interval_ms: u64,
    pub cache_ttl_seconds: u64,
}

impl Default for GeocodingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "stray_safe/0.1".to_string(),
            timeout_seconds: 10,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            min_interval_ms: 1100,
            cache_ttl_seconds: 86_400,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSection {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout_seconds: u64,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://router.project-osrm.org".to_string(),
            timeout_seconds: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsSection {
    pub email: Option<EmailSection>,
    pub sms: Option<SmsSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSection {
    #[serde(default = "default_sendgrid_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    pub from_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSection {
    #[serde(default = "default_twilio_endpoint")]
    pub endpoint: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

fn default_sendgrid_endpoint() -> String {
    "https://api.sendgrid.com".to_string()
}

fn default_twilio_endpoint() -> String {
    "https://api.twilio.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminSection {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
    pub phone: String,
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            email: "admin@straysafe.org".to_string(),
            name: "Administrator".to_string(),
            password: None,
            phone: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: LogFormat,
    pub verbose: bool,
}

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"))
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PlatformError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| PlatformError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are left
    /// as-is so validation can point at them.
    fn substitute_env_vars(content: &str) -> String {
        env_var_regex()
            .replace_all(content, |caps: &regex::Captures| {
                let name = &caps[1];
                std::env::var(name).unwrap_or_else(|_| format!("${{{}}}", name))
            })
            .into_owned()
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_positive_number(
            "platform.notify_concurrency",
            self.platform.notify_concurrency,
            1,
        )?;
        if !self.platform.city_center.is_valid() {
            return Err(PlatformError::InvalidConfigValueError {
                field: "platform.city_center".to_string(),
                value: self.platform.city_center.to_string(),
                reason: "Coordinates out of range".to_string(),
            });
        }

        if self.geocoding.enabled {
            validation::validate_url("geocoding.endpoint", &self.geocoding.endpoint)?;
            validation::validate_non_empty_string(
                "geocoding.user_agent",
                &self.geocoding.user_agent,
            )?;
        }
        if self.routing.enabled {
            validation::validate_url("routing.endpoint", &self.routing.endpoint)?;
        }

        if let Some(email) = &self.notifications.email {
            validation::validate_url("notifications.email.endpoint", &email.endpoint)?;
            check_resolved("notifications.email.api_key", &email.api_key)?;
            validation::validate_email("notifications.email.from_email", &email.from_email)?;
        }
        if let Some(sms) = &self.notifications.sms {
            validation::validate_url("notifications.sms.endpoint", &sms.endpoint)?;
            check_resolved("notifications.sms.account_sid", &sms.account_sid)?;
            check_resolved("notifications.sms.auth_token", &sms.auth_token)?;
            validation::validate_phone("notifications.sms.from_number", &sms.from_number)?;
        }

        validation::validate_email("admin.email", &self.admin.email)?;
        Ok(())
    }
}

fn check_resolved(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PlatformError::MissingConfigError {
            field: field.to_string(),
        });
    }
    if env_var_regex().is_match(value) {
        return Err(PlatformError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Environment variable is not set".to_string(),
        });
    }
    Ok(())
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
