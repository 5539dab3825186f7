//! Platform seams for the embedded booking overlay.
//!
//! The overlay talks to the browser only through these traits and through
//! the subscription objects in [`PlatformSignals`]. The [`fake`] module
//! provides in-memory implementations used by tests and rehearsals.

use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use embed_core::{FrameRequest, FrameSignal};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

pub mod fake;

/// Window features used when opening the booking site externally.
pub const EXTERNAL_WINDOW_FEATURES: &str =
    "noopener,noreferrer,width=375,height=667,scrollbars=yes,resizable=yes";

/// Viewport meta content pinned while the overlay is open.
pub const LOCKED_VIEWPORT: &str = "width=device-width, initial-scale=1.0, maximum-scale=1.0, \
                                   user-scalable=no, viewport-fit=cover";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("popup blocked")]
    PopupBlocked,
    #[error("platform operation unavailable: {0}")]
    Unavailable(String),
    #[error("platform backend failure: {0}")]
    Backend(String),
}

/// Wall clock used for cache-busting timestamps.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
            .unwrap_or(0)
    }
}

pub trait UserAgent: Send + Sync {
    fn user_agent(&self) -> String;
}

/// Host of the embedding frame.
pub trait FrameHost: Send + Sync {
    /// Point the frame at `request.url` with the given attributes.
    fn load(&self, request: &FrameRequest) -> Result<(), PlatformError>;
}

/// A browsing context opened outside the overlay.
pub trait BrowsingContext: Send {
    fn is_open(&self) -> bool;
}

pub trait Navigator: Send + Sync {
    fn open_window(
        &self,
        url: &str,
        features: &str,
    ) -> Result<Box<dyn BrowsingContext>, PlatformError>;

    /// Navigate the current page.
    fn navigate(&self, url: &str) -> Result<(), PlatformError>;
}

/// Host page chrome the overlay hides while it is open.
pub trait HostPage: Send + Sync {
    /// Hide navigation/header and lock body scrolling.
    fn hide_chrome(&self) -> Result<(), PlatformError>;

    fn restore_chrome(&self) -> Result<(), PlatformError>;

    fn viewport_meta(&self) -> Option<String>;

    fn set_viewport_meta(&self, content: &str) -> Result<(), PlatformError>;
}

/// Services injected into a session at construction.
#[derive(Clone)]
pub struct Platform {
    pub clock: Arc<dyn Clock>,
    pub user_agent: Arc<dyn UserAgent>,
    pub frame: Arc<dyn FrameHost>,
    pub navigator: Arc<dyn Navigator>,
    pub host_page: Arc<dyn HostPage>,
}

/// Platform event subscriptions owned by one session.
///
/// Dropping this value releases every subscription.
pub struct PlatformSignals {
    /// Online/offline state; the current value is read at mount.
    pub connectivity: watch::Receiver<bool>,
    /// Viewport height in CSS pixels.
    pub viewport_height: watch::Receiver<u32>,
    /// Load/error events and cross-origin messages from the frame.
    pub frame: mpsc::Receiver<FrameSignal>,
}

/// Holds the host page locked while alive and restores it on drop.
pub struct PageLock {
    page: Arc<dyn HostPage>,
    original_viewport: Option<String>,
}

impl PageLock {
    pub fn acquire(page: Arc<dyn HostPage>) -> Result<Self, PlatformError> {
        page.hide_chrome()?;
        let original_viewport = page.viewport_meta();
        if let Err(err) = page.set_viewport_meta(LOCKED_VIEWPORT) {
            let _ = page.restore_chrome();
            return Err(err);
        }
        Ok(Self {
            page,
            original_viewport,
        })
    }
}

impl fmt::Debug for PageLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageLock")
            .field("original_viewport", &self.original_viewport)
            .finish_non_exhaustive()
    }
}

impl Drop for PageLock {
    fn drop(&mut self) {
        let _ = self.page.restore_chrome();
        if let Some(original) = self.original_viewport.as_deref() {
            let _ = self.page.set_viewport_meta(original);
        }
    }
}
