use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

const FRAME_SANDBOX: &str = "allow-scripts allow-same-origin allow-forms allow-popups \
                             allow-popups-to-escape-sandbox \
                             allow-top-navigation-by-user-activation allow-downloads";
const FRAME_PERMISSIONS: &str = "payment; geolocation; camera; microphone";
const FRAME_REFERRER_POLICY: &str = "strict-origin-when-cross-origin";

/// Underlying load phase of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LoadPhase {
    /// An attempt is in flight and its timer is armed.
    Loading,
    /// The embedded content reported a successful load.
    Ready,
    /// Automatic retries are exhausted; waiting for a manual action.
    Error,
}

/// Phase as presented to the user.
///
/// `Offline` is an overlay computed from connectivity; it masks the load
/// phase without replacing it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Ready,
    Error,
    Offline,
}

impl ViewPhase {
    /// Resolve the displayed phase from the load phase and connectivity.
    pub fn resolve(phase: LoadPhase, online: bool) -> Self {
        if !online {
            return Self::Offline;
        }
        match phase {
            LoadPhase::Loading => Self::Loading,
            LoadPhase::Ready => Self::Ready,
            LoadPhase::Error => Self::Error,
        }
    }
}

/// Monotonic token identifying one load attempt.
///
/// Every timer and frame callback carries the token it was issued for; the
/// state machine ignores callbacks whose token is no longer current.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Query-parameter decoration applied to each request URL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UrlDecoration {
    /// Embedding and mobile hints plus the cache-busting timestamp.
    #[default]
    Rich,
    /// Cache-busting timestamp only.
    Minimal,
}

impl UrlDecoration {
    /// Parse a configuration value (`rich` / `minimal`, case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rich" => Some(Self::Rich),
            "minimal" => Some(Self::Minimal),
            _ => None,
        }
    }
}

/// Caller-supplied description of what to embed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionSpec {
    /// Absolute booking URL, for example `https://booking.example.com/widget`.
    pub target_url: String,
    /// Human-readable label for the embedded service.
    pub service_name: String,
}

impl SessionSpec {
    pub fn new(target_url: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            service_name: service_name.into(),
        }
    }
}

/// Per-request inputs sampled from the platform when an attempt starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// Wall clock in milliseconds since Unix epoch, used for cache busting.
    pub now_ms: u64,
    /// Whether the user agent looks like a mobile device.
    pub mobile: bool,
}

/// Attributes the host applies to the embedding frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameAttributes {
    pub sandbox: String,
    pub allow: String,
    pub referrer_policy: String,
    pub title: String,
    pub aria_label: String,
}

impl FrameAttributes {
    pub fn for_service(service_name: &str) -> Self {
        Self {
            sandbox: FRAME_SANDBOX.to_owned(),
            allow: FRAME_PERMISSIONS.to_owned(),
            referrer_policy: FRAME_REFERRER_POLICY.to_owned(),
            title: format!("Secure booking - {service_name}"),
            aria_label: format!("Booking form for {service_name}"),
        }
    }
}

/// One frame load the host must issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameRequest {
    /// Attempt token to echo back in `FrameSignal::Loaded`/`Failed`.
    pub attempt: AttemptId,
    /// Decorated request URL.
    pub url: String,
    pub attributes: FrameAttributes,
}

/// User actions issued by the overlay chrome.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmbedCommand {
    /// Manual retry; always allowed, even after automatic retries run out.
    Retry,
    /// Open the booking site outside the overlay, then close.
    OpenExternally,
    /// Dismiss the overlay.
    Close,
}

/// Signals raised by the embedded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameSignal {
    /// Native load-completion event for the given attempt.
    Loaded { attempt: AttemptId },
    /// Native load-error event for the given attempt.
    Failed { attempt: AttemptId },
    /// Cross-origin message posted by the embedded content.
    Message {
        origin: String,
        payload: serde_json::Value,
    },
}

/// Why an attempt was treated as failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureCause {
    /// The attempt timer expired while still loading.
    Timeout,
    /// The frame raised a native load error.
    FrameError,
    /// The embedded content posted `iframe_error`.
    Reported,
    /// The host could not issue the frame load.
    HostRejected,
}

/// Reason a cross-origin message was dropped without a state change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscardReason {
    /// Sender origin does not match the target URL's host.
    UntrustedOrigin,
    /// Payload is not a JSON object with a string `type`.
    Malformed,
    /// Well-formed payload with an unknown `type`.
    Unrecognized,
}

/// Event channel output emitted by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmbedEvent {
    /// A new load attempt was issued.
    AttemptStarted {
        attempt: AttemptId,
        /// Retries issued so far in the current run.
        attempt_count: u32,
        /// Decorated request URL.
        url: String,
    },
    /// The current attempt failed; a retry or the error phase follows.
    AttemptFailed {
        attempt: AttemptId,
        cause: FailureCause,
    },
    /// The displayed phase (or attempt count) changed.
    PhaseChanged { view: ViewPhase, attempt_count: u32 },
    /// Platform connectivity flipped.
    ConnectivityChanged { online: bool },
    /// A cross-origin message was discarded.
    MessageDiscarded { reason: DiscardReason },
    /// The embedded content reported a completed booking.
    BookingCompleted,
    /// Debounced viewport height update.
    ViewportResized { height_px: u32 },
    /// The booking site was opened outside the overlay.
    ExternalOpened {
        url: String,
        /// `true` when the current page was navigated instead of a new window.
        navigated: bool,
    },
    /// The session was torn down.
    Closed,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedEffect {
    /// Issue a frame load.
    LoadFrame(FrameRequest),
    /// Arm the single attempt timer, replacing any armed timer.
    ArmTimeout { attempt: AttemptId, after: Duration },
    /// Cancel the armed timer, if any.
    CancelTimeout,
    /// Open the URL in a new browsing context, falling back to navigation.
    OpenExternal { url: String },
    /// Invoke the caller's close callback and tear down.
    Close,
    /// Publish an event to subscribers.
    Emit(EmbedEvent),
}
