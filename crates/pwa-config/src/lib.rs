//! Offline caching rules and web app manifest for the booking site.
//!
//! Everything here is plain data: [`ServiceWorkerConfig`] answers which
//! runtime cache rule handles a URL, which build outputs are precached and
//! which navigations fall back to the app shell. [`WebManifest`] describes
//! the installable app. Both render to JSON for the service worker build.

mod error;
mod manifest;
mod rules;
mod service_worker;

pub use error::PwaConfigError;
pub use manifest::{
    DEFAULT_ICON_SIZES, FileHandler, IconPurpose, LaunchHandler, ManifestIcon, ManifestScreenshot,
    ManifestShortcut, ProtocolHandler, ScreenshotForm, ShareParams, ShareTarget, WebManifest,
    icon_set,
};
pub use rules::{CacheKey, CacheStrategy, Expiration, RuntimeCacheRule, default_rules};
pub use service_worker::{NavigationFallback, PrecachePolicy, ServiceWorkerConfig};
