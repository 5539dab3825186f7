use std::time::Duration;

use regex::Regex;
use serde::{Serialize, Serializer};
use url::Url;

use crate::PwaConfigError;

const DAY: Duration = Duration::from_secs(60 * 60 * 24);

/// How the service worker answers a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "handler")]
pub enum CacheStrategy {
    CacheFirst,
    /// Network with a timeout, cache when the network is slow or down.
    NetworkFirst {
        #[serde(rename = "networkTimeoutSeconds", serialize_with = "as_secs")]
        network_timeout: Duration,
    },
    StaleWhileRevalidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expiration {
    pub max_entries: u32,
    #[serde(rename = "maxAgeSeconds", serialize_with = "as_secs")]
    pub max_age: Duration,
}

/// Rewrites applied to the request URL before it is used as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheKey {
    Plain,
    /// `?version=<tag>`; bump the tag to invalidate.
    Versioned(String),
    /// `?cache-bust=<now>`; every store gets a fresh key.
    Timestamped,
}

impl CacheKey {
    pub fn key_for(&self, url: &str, now_ms: u64) -> String {
        match self {
            Self::Plain => url.to_owned(),
            Self::Versioned(tag) => format!("{url}?version={tag}"),
            Self::Timestamped => format!("{url}?cache-bust={now_ms}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeCacheRule {
    #[serde(rename = "urlPattern", serialize_with = "as_pattern")]
    pub pattern: Regex,
    #[serde(flatten)]
    pub strategy: CacheStrategy,
    pub cache_name: String,
    pub expiration: Expiration,
    /// Response statuses allowed into the cache; empty means the strategy default.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cacheable_statuses: Vec<u16>,
    pub cache_key: CacheKey,
}

impl RuntimeCacheRule {
    pub fn new(
        pattern: &str,
        strategy: CacheStrategy,
        cache_name: impl Into<String>,
        expiration: Expiration,
    ) -> Result<Self, PwaConfigError> {
        let pattern = Regex::new(pattern).map_err(|source| PwaConfigError::InvalidPattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            pattern,
            strategy,
            cache_name: cache_name.into(),
            expiration,
            cacheable_statuses: Vec::new(),
            cache_key: CacheKey::Plain,
        })
    }

    pub fn with_cache_key(mut self, cache_key: CacheKey) -> Self {
        self.cache_key = cache_key;
        self
    }

    pub fn with_cacheable_statuses(mut self, statuses: &[u16]) -> Self {
        self.cacheable_statuses = statuses.to_vec();
        self
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }

    pub fn caches_status(&self, status: u16) -> bool {
        if self.cacheable_statuses.is_empty() {
            return status == 200;
        }
        self.cacheable_statuses.contains(&status)
    }
}

/// The booking site's runtime caching rules, in match order.
pub fn default_rules(booking_url: &Url) -> Result<Vec<RuntimeCacheRule>, PwaConfigError> {
    let host = booking_url
        .host_str()
        .ok_or_else(|| PwaConfigError::MissingHost(booking_url.to_string()))?;
    let booking_pattern = format!(
        r"(?i)^{}://{}/.*",
        regex::escape(booking_url.scheme()),
        regex::escape(host)
    );
    let fonts = Expiration {
        max_entries: 30,
        max_age: DAY * 365,
    };

    Ok(vec![
        RuntimeCacheRule::new(
            r"(?i)^https://fonts\.googleapis\.com/.*",
            CacheStrategy::CacheFirst,
            "google-fonts-cache",
            fonts,
        )?
        .with_cache_key(CacheKey::Versioned("1".to_owned())),
        RuntimeCacheRule::new(
            r"(?i)^https://fonts\.gstatic\.com/.*",
            CacheStrategy::CacheFirst,
            "gstatic-fonts-cache",
            fonts,
        )?,
        RuntimeCacheRule::new(
            &booking_pattern,
            CacheStrategy::NetworkFirst {
                network_timeout: Duration::from_secs(10),
            },
            "booking-cache",
            Expiration {
                max_entries: 50,
                max_age: DAY,
            },
        )?
        .with_cache_key(CacheKey::Timestamped)
        .with_cacheable_statuses(&[0, 200]),
        RuntimeCacheRule::new(
            r"\.(?:png|jpg|jpeg|svg|gif|webp|ico)$",
            CacheStrategy::CacheFirst,
            "images-cache",
            Expiration {
                max_entries: 200,
                max_age: DAY * 30,
            },
        )?,
        RuntimeCacheRule::new(
            r"\.(?:js|css)$",
            CacheStrategy::StaleWhileRevalidate,
            "static-resources",
            Expiration {
                max_entries: 100,
                max_age: DAY * 7,
            },
        )?,
    ])
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

fn as_pattern<S: Serializer>(pattern: &Regex, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(pattern.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking() -> Url {
        Url::parse("https://www.bokadirekt.se/places/barber-96").expect("valid url")
    }

    #[test]
    fn cache_keys_rewrite_urls() {
        let url = "https://fonts.googleapis.com/css2?family=Inter";
        assert_eq!(CacheKey::Plain.key_for(url, 5), url);
        assert_eq!(
            CacheKey::Versioned("1".to_owned()).key_for("https://fonts.googleapis.com/css2", 5),
            "https://fonts.googleapis.com/css2?version=1"
        );
        assert_eq!(
            CacheKey::Timestamped.key_for("https://www.bokadirekt.se/a", 42),
            "https://www.bokadirekt.se/a?cache-bust=42"
        );
    }

    #[test]
    fn booking_rule_is_scoped_to_booking_host() {
        let rules = default_rules(&booking()).expect("rules should build");
        let rule = &rules[2];
        assert_eq!(rule.cache_name, "booking-cache");
        assert!(rule.matches("https://WWW.BOKADIREKT.SE/places/x"));
        assert!(!rule.matches("https://bokadirekt.se.evil.example/places/x"));
        assert!(rule.caches_status(0));
        assert!(!rule.caches_status(404));
    }

    #[test]
    fn default_status_policy_only_caches_ok() {
        let rules = default_rules(&booking()).expect("rules should build");
        assert!(rules[0].caches_status(200));
        assert!(!rules[0].caches_status(0));
    }

    #[test]
    fn rejects_bad_patterns() {
        let err = RuntimeCacheRule::new(
            "(unclosed",
            CacheStrategy::CacheFirst,
            "x",
            Expiration {
                max_entries: 1,
                max_age: DAY,
            },
        )
        .expect_err("pattern must fail");
        assert!(matches!(err, PwaConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn serializes_network_first_with_timeout() {
        let rules = default_rules(&booking()).expect("rules should build");
        let value = serde_json::to_value(&rules[2]).expect("rule should serialize");
        assert_eq!(value["handler"], "NetworkFirst");
        assert_eq!(value["networkTimeoutSeconds"], 10);
        assert_eq!(value["cacheName"], "booking-cache");
        assert_eq!(value["expiration"]["maxEntries"], 50);
        assert_eq!(value["expiration"]["maxAgeSeconds"], 86_400);
        assert_eq!(value["cacheableStatuses"], serde_json::json!([0, 200]));
        assert_eq!(value["cacheKey"]["kind"], "timestamped");
    }
}
