//! Environment-backed configuration for `booking-overlay`.

use std::{env, path::PathBuf};

use embed_core::{LoadPolicy, SessionSpec, UrlDecoration, parse_target_url};
use thiserror::Error;
use url::Url;

const DEFAULT_SERVICE_NAME: &str = "Booking";
const DEFAULT_LOAD_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_EXTERNAL_GRACE_MS: u64 = 100;
const DEFAULT_PWA_OUT_DIR: &str = "./dist-pwa";
const DEFAULT_APP_NAME: &str = "Online Booking";
const DEFAULT_APP_SHORT_NAME: &str = "Booking";
const DEFAULT_THEME_COLOR: &str = "#1A1A1A";

/// Runtime configuration for the overlay and its PWA artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Booking site embedded in the overlay.
    pub booking_url: Url,
    pub service_name: String,
    pub policy: LoadPolicy,
    /// Output directory for `manifest.webmanifest` and `sw-config.json`.
    pub pwa_out_dir: PathBuf,
    pub app_name: String,
    pub app_short_name: String,
    pub theme_color: String,
    /// Shown next to the retry actions when set.
    pub contact_phone: Option<String>,
}

impl OverlayConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let raw_url = optional_trimmed_env("BOOKING_URL", &mut lookup)
            .ok_or(ConfigError::Missing("BOOKING_URL"))?;
        let booking_url = parse_target_url(&raw_url).map_err(|err| ConfigError::InvalidValue {
            key: "BOOKING_URL",
            value: raw_url.clone(),
            reason: err.message,
        })?;

        let service_name = optional_trimmed_env("BOOKING_SERVICE_NAME", &mut lookup)
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned());

        let load_timeout_ms = parse_u64_with_default(
            "BOOKING_LOAD_TIMEOUT_MS",
            DEFAULT_LOAD_TIMEOUT_MS,
            &mut lookup,
        )?;
        if load_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "BOOKING_LOAD_TIMEOUT_MS",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        let max_attempts =
            parse_u32_with_default("BOOKING_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS, &mut lookup)?;
        let external_grace_ms = parse_u64_with_default(
            "BOOKING_EXTERNAL_GRACE_MS",
            DEFAULT_EXTERNAL_GRACE_MS,
            &mut lookup,
        )?;

        let decoration = match optional_trimmed_env("BOOKING_URL_DECORATION", &mut lookup) {
            None => UrlDecoration::default(),
            Some(value) => UrlDecoration::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                key: "BOOKING_URL_DECORATION",
                value,
                reason: "expected `rich` or `minimal`".to_owned(),
            })?,
        };

        let policy = LoadPolicy::new(load_timeout_ms, max_attempts)
            .with_decoration(decoration)
            .with_external_open_grace_ms(external_grace_ms);

        let pwa_out_dir = optional_trimmed_env("BOOKING_PWA_OUT_DIR", &mut lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PWA_OUT_DIR));
        let app_name = optional_trimmed_env("BOOKING_APP_NAME", &mut lookup)
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_owned());
        let app_short_name = optional_trimmed_env("BOOKING_APP_SHORT_NAME", &mut lookup)
            .unwrap_or_else(|| DEFAULT_APP_SHORT_NAME.to_owned());

        let theme_color = optional_trimmed_env("BOOKING_THEME_COLOR", &mut lookup)
            .unwrap_or_else(|| DEFAULT_THEME_COLOR.to_owned());
        if !is_hex_color(&theme_color) {
            return Err(ConfigError::InvalidValue {
                key: "BOOKING_THEME_COLOR",
                value: theme_color,
                reason: "expected #RGB or #RRGGBB".to_owned(),
            });
        }

        let contact_phone = optional_trimmed_env("BOOKING_CONTACT_PHONE", &mut lookup);

        Ok(Self {
            booking_url,
            service_name,
            policy,
            pwa_out_dir,
            app_name,
            app_short_name,
            theme_color,
            contact_phone,
        })
    }

    pub fn session_spec(&self) -> SessionSpec {
        SessionSpec::new(self.booking_url.as_str(), self.service_name.as_str())
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required {0}")]
    Missing(&'static str),
    /// An environment variable could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_u64_with_default<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn parse_u32_with_default<F>(
    key: &'static str,
    default: u32,
    lookup: &mut F,
) -> Result<u32, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<u32>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn is_hex_color(value: &str) -> bool {
    value.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 6) && hex.chars().all(|ch| ch.is_ascii_hexdigit())
    })
}
