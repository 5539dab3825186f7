//! In-memory platform used by tests and headless rehearsals.

use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use embed_core::{FrameRequest, FrameSignal};
use tokio::sync::{mpsc, watch};

use crate::{
    BrowsingContext, Clock, FrameHost, HostPage, Navigator, Platform, PlatformError,
    PlatformSignals, UserAgent,
};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/128.0";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Manually advanced wall clock.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_ms: AtomicU64,
}

impl FakeClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn advance(&self, by_ms: u64) {
        self.now_ms.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct FixedUserAgent(pub String);

impl Default for FixedUserAgent {
    fn default() -> Self {
        Self(DESKTOP_USER_AGENT.to_owned())
    }
}

impl UserAgent for FixedUserAgent {
    fn user_agent(&self) -> String {
        self.0.clone()
    }
}

/// Records every frame load; optionally rejects them.
#[derive(Debug, Default)]
pub struct FakeFrameHost {
    requests: Mutex<Vec<FrameRequest>>,
    reject: AtomicBool,
}

impl FakeFrameHost {
    pub fn requests(&self) -> Vec<FrameRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<FrameRequest> {
        lock(&self.requests).last().cloned()
    }

    pub fn reject_loads(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }
}

impl FrameHost for FakeFrameHost {
    fn load(&self, request: &FrameRequest) -> Result<(), PlatformError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("frame detached".to_owned()));
        }
        lock(&self.requests).push(request.clone());
        Ok(())
    }
}

/// How the fake navigator responds to `open_window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowBehavior {
    /// The new context opens and stays open.
    #[default]
    Opens,
    /// The new context is closed before the grace period ends.
    ClosesImmediately,
    /// The platform refuses to open a context.
    Blocked,
}

#[derive(Debug, Default)]
pub struct FakeNavigator {
    behavior: Mutex<WindowBehavior>,
    opened: Mutex<Vec<(String, String)>>,
    navigations: Mutex<Vec<String>>,
}

impl FakeNavigator {
    pub fn with_behavior(behavior: WindowBehavior) -> Self {
        Self {
            behavior: Mutex::new(behavior),
            ..Self::default()
        }
    }

    pub fn set_behavior(&self, behavior: WindowBehavior) {
        *lock(&self.behavior) = behavior;
    }

    /// `(url, features)` for every `open_window` call.
    pub fn opened(&self) -> Vec<(String, String)> {
        lock(&self.opened).clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        lock(&self.navigations).clone()
    }
}

struct FakeContext {
    open: bool,
}

impl BrowsingContext for FakeContext {
    fn is_open(&self) -> bool {
        self.open
    }
}

impl Navigator for FakeNavigator {
    fn open_window(
        &self,
        url: &str,
        features: &str,
    ) -> Result<Box<dyn BrowsingContext>, PlatformError> {
        lock(&self.opened).push((url.to_owned(), features.to_owned()));
        match *lock(&self.behavior) {
            WindowBehavior::Opens => Ok(Box::new(FakeContext { open: true })),
            WindowBehavior::ClosesImmediately => Ok(Box::new(FakeContext { open: false })),
            WindowBehavior::Blocked => Err(PlatformError::PopupBlocked),
        }
    }

    fn navigate(&self, url: &str) -> Result<(), PlatformError> {
        lock(&self.navigations).push(url.to_owned());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeHostPage {
    chrome_hidden: AtomicBool,
    fail_viewport: AtomicBool,
    viewport: Mutex<Option<String>>,
}

impl FakeHostPage {
    pub fn with_viewport(content: &str) -> Self {
        Self {
            viewport: Mutex::new(Some(content.to_owned())),
            ..Self::default()
        }
    }

    pub fn chrome_hidden(&self) -> bool {
        self.chrome_hidden.load(Ordering::SeqCst)
    }

    pub fn fail_viewport_updates(&self) {
        self.fail_viewport.store(true, Ordering::SeqCst);
    }
}

impl HostPage for FakeHostPage {
    fn hide_chrome(&self) -> Result<(), PlatformError> {
        self.chrome_hidden.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn restore_chrome(&self) -> Result<(), PlatformError> {
        self.chrome_hidden.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn viewport_meta(&self) -> Option<String> {
        lock(&self.viewport).clone()
    }

    fn set_viewport_meta(&self, content: &str) -> Result<(), PlatformError> {
        if self.fail_viewport.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("viewport meta missing".to_owned()));
        }
        *lock(&self.viewport) = Some(content.to_owned());
        Ok(())
    }
}

/// Test-side handles for driving a fake platform.
pub struct FakeControls {
    pub clock: Arc<FakeClock>,
    pub frame: Arc<FakeFrameHost>,
    pub navigator: Arc<FakeNavigator>,
    pub host_page: Arc<FakeHostPage>,
    connectivity_tx: watch::Sender<bool>,
    viewport_tx: watch::Sender<u32>,
    frame_tx: mpsc::Sender<FrameSignal>,
}

impl FakeControls {
    pub fn set_online(&self, online: bool) {
        let _ = self.connectivity_tx.send(online);
    }

    pub fn resize(&self, height_px: u32) {
        let _ = self.viewport_tx.send(height_px);
    }

    /// Deliver a frame signal; `false` once the session stopped listening.
    pub async fn signal(&self, signal: FrameSignal) -> bool {
        self.frame_tx.send(signal).await.is_ok()
    }

    /// Whether the session still holds any of its platform subscriptions.
    pub fn subscribed(&self) -> bool {
        !self.frame_tx.is_closed()
            || !self.connectivity_tx.is_closed()
            || !self.viewport_tx.is_closed()
    }
}

/// Builder for a fully in-memory platform.
#[derive(Debug, Clone)]
pub struct FakePlatform {
    online: bool,
    viewport_height: u32,
    user_agent: String,
    window_behavior: WindowBehavior,
    now_ms: u64,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            online: true,
            viewport_height: 844,
            user_agent: DESKTOP_USER_AGENT.to_owned(),
            window_behavior: WindowBehavior::Opens,
            now_ms: 1_700_000_000_000,
        }
    }
}

impl FakePlatform {
    pub fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn window_behavior(mut self, behavior: WindowBehavior) -> Self {
        self.window_behavior = behavior;
        self
    }

    pub fn build(self) -> (Platform, PlatformSignals, FakeControls) {
        let clock = Arc::new(FakeClock::new(self.now_ms));
        let frame = Arc::new(FakeFrameHost::default());
        let navigator = Arc::new(FakeNavigator::with_behavior(self.window_behavior));
        let host_page = Arc::new(FakeHostPage::with_viewport(
            "width=device-width, initial-scale=1.0",
        ));

        let (connectivity_tx, connectivity) = watch::channel(self.online);
        let (viewport_tx, viewport_height) = watch::channel(self.viewport_height);
        let (frame_tx, frame_rx) = mpsc::channel(32);

        let platform = Platform {
            clock: clock.clone(),
            user_agent: Arc::new(FixedUserAgent(self.user_agent)),
            frame: frame.clone(),
            navigator: navigator.clone(),
            host_page: host_page.clone(),
        };
        let signals = PlatformSignals {
            connectivity,
            viewport_height,
            frame: frame_rx,
        };
        let controls = FakeControls {
            clock,
            frame,
            navigator,
            host_page,
            connectivity_tx,
            viewport_tx,
            frame_tx,
        };
        (platform, signals, controls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigator_records_opens_and_navigations() {
        let navigator = FakeNavigator::with_behavior(WindowBehavior::ClosesImmediately);
        let context = navigator
            .open_window("https://booking.example.com/", "noopener")
            .expect("open should succeed");
        assert!(!context.is_open());

        navigator.set_behavior(WindowBehavior::Blocked);
        assert_eq!(
            navigator.open_window("https://booking.example.com/", "").err(),
            Some(PlatformError::PopupBlocked)
        );

        navigator
            .navigate("https://booking.example.com/")
            .expect("navigate should succeed");
        assert_eq!(navigator.opened().len(), 2);
        assert_eq!(navigator.navigations(), vec!["https://booking.example.com/"]);
    }

    #[test]
    fn frame_host_can_reject_loads() {
        let host = FakeFrameHost::default();
        host.reject_loads(true);
        let request = FrameRequest {
            attempt: embed_core::AttemptId::new(1),
            url: "https://booking.example.com/".to_owned(),
            attributes: embed_core::FrameAttributes::for_service("Cut"),
        };
        assert!(host.load(&request).is_err());
        assert!(host.requests().is_empty());
    }

    #[test]
    fn controls_report_dropped_subscriptions() {
        let (_platform, signals, controls) = FakePlatform::default().build();
        assert!(controls.subscribed());
        drop(signals);
        assert!(!controls.subscribed());
    }
}
