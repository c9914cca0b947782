//! Layered configuration for uabridge.
//!
//! Defaults, then an optional TOML file, then `UABRIDGE_*` environment
//! variables, then the bare `API_URL` / `ACCESS_TOKEN` variables older
//! deployments set. The result translates into
//! `uabridge_api::TransportConfig` and `uabridge_core::BridgeConfig`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use uabridge_api::{TlsMode, TransportConfig};
use uabridge_core::BridgeConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured (set ACCESS_TOKEN or UABRIDGE_ACCESS_TOKEN)")]
    MissingToken,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Everything a uabridge process needs to know.
#[derive(Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Base URL of the management backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Bearer credential for the backend. Never serialized.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Backend request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Accept invalid backend certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Custom CA certificate (PEM) for the backend.
    #[serde(default)]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            access_token: None,
            timeout: default_timeout(),
            insecure: false,
            ca_cert: None,
            bridge: BridgeSettings::default(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .field("insecure", &self.insecure)
            .field("ca_cert", &self.ca_cert)
            .field("bridge", &self.bridge)
            .finish()
    }
}

fn default_api_url() -> String {
    "http://api/".into()
}
fn default_timeout() -> u64 {
    30
}

/// Engine timing, in whole units as they appear in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub cycle_secs: u64,
    pub write_back_secs: u64,
    pub staleness_secs: u64,
    pub checked_at_lead_secs: u64,
    pub endpoint_timeout_secs: u64,
    pub publishing_interval_ms: u64,
    pub notification_capacity: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        let defaults = BridgeConfig::default();
        Self {
            cycle_secs: defaults.cycle_interval.as_secs(),
            write_back_secs: defaults.write_back_interval.as_secs(),
            staleness_secs: defaults.staleness_window.as_secs(),
            checked_at_lead_secs: defaults.checked_at_lead.as_secs(),
            endpoint_timeout_secs: defaults.endpoint_timeout.as_secs(),
            publishing_interval_ms: u64::try_from(defaults.publishing_interval.as_millis())
                .unwrap_or(1000),
            notification_capacity: defaults.notification_capacity,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "uabridge", "uabridge").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("uabridge");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Build the provider chain. `path` overrides the platform config file.
pub fn figment(path: Option<&Path>) -> Figment {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UABRIDGE_").split("__"))
        .merge(Env::raw().only(&["API_URL", "ACCESS_TOKEN"]))
}

/// Load and validate settings. A missing file is not an error.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let settings: Settings = figment(path).extract()?;
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Check values that would only fail later, deep inside a cycle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.api_url()?;
        if self.timeout == 0 {
            return Err(invalid("timeout", "must be at least 1 second"));
        }
        let b = &self.bridge;
        if b.cycle_secs == 0 {
            return Err(invalid("bridge.cycle_secs", "must be at least 1 second"));
        }
        if b.write_back_secs == 0 {
            return Err(invalid("bridge.write_back_secs", "must be at least 1 second"));
        }
        if b.write_back_secs > b.cycle_secs {
            return Err(invalid(
                "bridge.write_back_secs",
                "must not exceed bridge.cycle_secs",
            ));
        }
        if b.endpoint_timeout_secs == 0 {
            return Err(invalid("bridge.endpoint_timeout_secs", "must be at least 1 second"));
        }
        if b.notification_capacity == 0 {
            return Err(invalid("bridge.notification_capacity", "must be at least 1"));
        }
        Ok(())
    }

    pub fn api_url(&self) -> Result<Url, ConfigError> {
        self.api_url
            .parse()
            .map_err(|e| invalid("api_url", &format!("{e}: {}", self.api_url)))
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        }
    }

    /// Backend transport settings. Fails without an access token.
    pub fn transport_config(&self) -> Result<TransportConfig, ConfigError> {
        let token = self
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        Ok(TransportConfig::new(SecretString::from(token.to_owned()))
            .with_timeout(Duration::from_secs(self.timeout))
            .with_tls(self.tls_mode()))
    }

    pub fn bridge_config(&self) -> BridgeConfig {
        let b = &self.bridge;
        BridgeConfig {
            cycle_interval: Duration::from_secs(b.cycle_secs),
            write_back_interval: Duration::from_secs(b.write_back_secs),
            staleness_window: Duration::from_secs(b.staleness_secs),
            checked_at_lead: Duration::from_secs(b.checked_at_lead_secs),
            endpoint_timeout: Duration::from_secs(b.endpoint_timeout_secs),
            publishing_interval: Duration::from_millis(b.publishing_interval_ms),
            notification_capacity: b.notification_capacity,
        }
    }

    /// Render as TOML. The access token is never included.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}
