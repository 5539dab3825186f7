use std::collections::HashSet;

use regex::Regex;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use url::Url;

use crate::{PwaConfigError, RuntimeCacheRule, default_rules};

const PRECACHE_EXTENSIONS: &[&str] = &[
    "js", "css", "html", "ico", "png", "svg", "jpeg", "jpg", "woff2", "woff", "ttf",
];
const MAX_PRECACHE_BYTES: u64 = 5_000_000;

/// Static files copied next to the build output and precached with it.
const INCLUDE_ASSETS: &[&str] = &[
    "favicon.ico",
    "offline.html",
    "logo.png",
    "staff/*.png",
    "browserconfig.xml",
];

const APP_SHELL: &str = "/index.html";
const NAVIGATION_DENYLIST: &[&str] = &[
    r"^/_",
    r"/[^/?]+\.[^/]+$",
    r"^/api/",
    r"^/offline\.html$",
    r"^/sw\.js$",
    r"^/manifest\.json$",
];

/// Build outputs copied into the cache at install time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecachePolicy {
    pub extensions: Vec<String>,
    pub max_file_size: u64,
}

impl Default for PrecachePolicy {
    fn default() -> Self {
        Self {
            extensions: PRECACHE_EXTENSIONS.iter().map(|ext| (*ext).to_owned()).collect(),
            max_file_size: MAX_PRECACHE_BYTES,
        }
    }
}

impl PrecachePolicy {
    pub fn should_precache(&self, path: &str, size_bytes: u64) -> bool {
        if size_bytes > self.max_file_size {
            return false;
        }
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let Some((stem, extension)) = file_name.rsplit_once('.') else {
            return false;
        };
        !stem.is_empty()
            && self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }

    pub fn glob_pattern(&self) -> String {
        format!("**/*.{{{}}}", self.extensions.join(","))
    }
}

impl Serialize for PrecachePolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PrecachePolicy", 2)?;
        state.serialize_field("globPatterns", &[self.glob_pattern()])?;
        state.serialize_field("maximumFileSizeToCacheInBytes", &self.max_file_size)?;
        state.end()
    }
}

/// App-shell fallback for client-side routed navigations.
#[derive(Debug, Clone)]
pub struct NavigationFallback {
    pub target: String,
    pub denylist: Vec<Regex>,
}

impl NavigationFallback {
    pub fn app_shell() -> Result<Self, PwaConfigError> {
        let denylist = NAVIGATION_DENYLIST
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| PwaConfigError::InvalidPattern {
                    pattern: (*pattern).to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            target: APP_SHELL.to_owned(),
            denylist,
        })
    }

    /// Document served for a navigation to `path`, if any.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        if self.denylist.iter().any(|pattern| pattern.is_match(path)) {
            return None;
        }
        Some(&self.target)
    }
}

impl Serialize for NavigationFallback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let denylist: Vec<&str> = self.denylist.iter().map(Regex::as_str).collect();
        let mut state = serializer.serialize_struct("NavigationFallback", 2)?;
        state.serialize_field("navigateFallback", &self.target)?;
        state.serialize_field("navigateFallbackDenylist", &denylist)?;
        state.end()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerConfig {
    #[serde(flatten)]
    pub precache: PrecachePolicy,
    pub runtime_caching: Vec<RuntimeCacheRule>,
    #[serde(flatten)]
    pub navigation: NavigationFallback,
    pub skip_waiting: bool,
    pub clients_claim: bool,
    pub cleanup_outdated_caches: bool,
    /// Queue analytics hits made offline and replay them later.
    pub offline_google_analytics: bool,
    pub include_assets: Vec<String>,
}

impl ServiceWorkerConfig {
    pub fn for_booking_site(booking_url: &Url) -> Result<Self, PwaConfigError> {
        Ok(Self {
            precache: PrecachePolicy::default(),
            runtime_caching: default_rules(booking_url)?,
            navigation: NavigationFallback::app_shell()?,
            skip_waiting: true,
            clients_claim: true,
            cleanup_outdated_caches: true,
            offline_google_analytics: true,
            include_assets: INCLUDE_ASSETS.iter().map(|asset| (*asset).to_owned()).collect(),
        })
    }

    /// First runtime rule matching `url`.
    pub fn route(&self, url: &str) -> Option<&RuntimeCacheRule> {
        self.runtime_caching.iter().find(|rule| rule.matches(url))
    }

    pub fn should_precache(&self, path: &str, size_bytes: u64) -> bool {
        self.precache.should_precache(path, size_bytes)
    }

    pub fn navigation_fallback(&self, path: &str) -> Option<&str> {
        self.navigation.resolve(path)
    }

    pub fn validate(&self) -> Result<(), PwaConfigError> {
        let mut seen = HashSet::new();
        for (index, rule) in self.runtime_caching.iter().enumerate() {
            if rule.cache_name.trim().is_empty() {
                return Err(PwaConfigError::EmptyCacheName { index });
            }
            if rule.expiration.max_entries == 0 {
                return Err(PwaConfigError::ZeroMaxEntries {
                    cache_name: rule.cache_name.clone(),
                });
            }
            if !seen.insert(rule.cache_name.as_str()) {
                return Err(PwaConfigError::DuplicateCacheName {
                    cache_name: rule.cache_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Validated, pretty-printed JSON for the service worker build.
    pub fn to_json(&self) -> Result<String, PwaConfigError> {
        self.validate()?;
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CacheStrategy;

    fn config() -> ServiceWorkerConfig {
        let booking = Url::parse("https://www.bokadirekt.se/places/barber-96").expect("valid url");
        ServiceWorkerConfig::for_booking_site(&booking).expect("config should build")
    }

    #[test]
    fn routes_to_first_matching_rule() {
        let config = config();
        let route = |url: &str| config.route(url).map(|rule| rule.cache_name.as_str());

        assert_eq!(
            route("https://fonts.googleapis.com/css2?family=Inter"),
            Some("google-fonts-cache")
        );
        assert_eq!(route("https://fonts.gstatic.com/s/inter.woff2"), Some("gstatic-fonts-cache"));
        // Booking host wins over the image rule.
        assert_eq!(route("https://www.bokadirekt.se/logo.png"), Some("booking-cache"));
        assert_eq!(route("https://cdn.example.com/staff/anna.webp"), Some("images-cache"));
        assert_eq!(route("https://cdn.example.com/assets/app.css"), Some("static-resources"));
        assert_eq!(route("https://cdn.example.com/api/slots"), None);
    }

    #[test]
    fn static_resources_revalidate_in_background() {
        let config = config();
        let rule = config.route("/assets/index-4f2a.js").expect("js should route");
        assert_eq!(rule.strategy, CacheStrategy::StaleWhileRevalidate);
        assert_eq!(rule.expiration.max_entries, 100);
    }

    #[test]
    fn precache_filters_by_extension_and_size() {
        let config = config();
        assert!(config.should_precache("assets/index.js", 120_000));
        assert!(config.should_precache("fonts/Inter.WOFF2", 40_000));
        assert!(!config.should_precache("assets/vendor.js", 5_000_001));
        assert!(!config.should_precache("robots.txt", 10));
        assert!(!config.should_precache("assets/.css", 10));
        assert!(!config.should_precache("LICENSE", 10));
    }

    #[test]
    fn navigation_fallback_skips_denylisted_paths() {
        let config = config();
        assert_eq!(config.navigation_fallback("/"), Some("/index.html"));
        assert_eq!(config.navigation_fallback("/om-oss"), Some("/index.html"));
        assert_eq!(config.navigation_fallback("/_internal"), None);
        assert_eq!(config.navigation_fallback("/api/slots"), None);
        assert_eq!(config.navigation_fallback("/staff/anna.png"), None);
        assert_eq!(config.navigation_fallback("/offline.html"), None);
        assert_eq!(config.navigation_fallback("/sw.js"), None);
        assert_eq!(config.navigation_fallback("/manifest.json"), None);
    }

    #[test]
    fn validation_rejects_broken_rules() {
        let mut config = config();
        config.runtime_caching[1].cache_name = "google-fonts-cache".to_owned();
        match config.validate() {
            Err(PwaConfigError::DuplicateCacheName { cache_name }) => {
                assert_eq!(cache_name, "google-fonts-cache");
            }
            other => panic!("unexpected validation result: {other:?}"),
        }

        let mut config = self::config();
        config.runtime_caching[3].expiration.max_entries = 0;
        assert!(matches!(
            config.validate(),
            Err(PwaConfigError::ZeroMaxEntries { .. })
        ));

        let mut config = self::config();
        config.runtime_caching[0].cache_name = " ".to_owned();
        assert!(matches!(
            config.to_json(),
            Err(PwaConfigError::EmptyCacheName { index: 0 })
        ));
    }

    #[test]
    fn renders_workbox_options() {
        let json = config().to_json().expect("config should render");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");

        assert_eq!(
            value["globPatterns"],
            serde_json::json!(["**/*.{js,css,html,ico,png,svg,jpeg,jpg,woff2,woff,ttf}"])
        );
        assert_eq!(value["maximumFileSizeToCacheInBytes"], 5_000_000);
        assert_eq!(value["navigateFallback"], "/index.html");
        assert_eq!(value["navigateFallbackDenylist"][1], r"/[^/?]+\.[^/]+$");
        assert_eq!(value["skipWaiting"], true);
        assert_eq!(value["clientsClaim"], true);
        assert_eq!(value["cleanupOutdatedCaches"], true);
        assert_eq!(value["offlineGoogleAnalytics"], true);
        assert_eq!(value["includeAssets"][1], "offline.html");
        assert_eq!(value["includeAssets"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["runtimeCaching"].as_array().map(Vec::len), Some(5));
        assert_eq!(value["runtimeCaching"][0]["cacheKey"]["value"], "1");
    }
}
