//! View reducer for the booking overlay.

use embed_core::{EmbedEvent, ViewPhase};
use tracing::{debug, trace};

const HEADER_TITLE: &str = "Secure Booking";
const LOADING_TEXT: &str = "Connecting to booking system";
const OFFLINE_TITLE: &str = "No Internet Connection";
const OFFLINE_TEXT: &str = "Check your internet connection and try again.";
const ERROR_TITLE: &str = "Could Not Load Booking";
const ERROR_TEXT: &str =
    "The booking system is temporarily unavailable. You can try again or open it in your browser.";

/// Panel covering the frame area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayPanel {
    Loading {
        text: &'static str,
        /// `Attempt n of m`, once an automatic retry is in flight.
        attempt_label: Option<String>,
    },
    Offline {
        title: &'static str,
        text: &'static str,
        retry_enabled: bool,
        contact_phone: Option<String>,
    },
    Error {
        title: &'static str,
        text: &'static str,
        can_retry: bool,
        can_open_externally: bool,
        contact_phone: Option<String>,
    },
    /// Frame content is visible.
    Frame,
}

/// Full overlay snapshot emitted after each event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySnapshot {
    pub header_title: &'static str,
    pub header_subtitle: String,
    pub online: bool,
    pub panel: OverlayPanel,
    pub viewport_height_px: Option<u32>,
    pub booking_completed: bool,
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub struct OverlayState {
    service_name: String,
    max_attempts: u32,
    contact_phone: Option<String>,
    view: ViewPhase,
    attempt_count: u32,
    online: bool,
    viewport_height_px: Option<u32>,
    booking_completed: bool,
    closed: bool,
}

impl OverlayState {
    pub fn new(
        service_name: impl Into<String>,
        max_attempts: u32,
        contact_phone: Option<String>,
        online: bool,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            max_attempts,
            contact_phone,
            view: ViewPhase::resolve(embed_core::LoadPhase::Loading, online),
            attempt_count: 0,
            online,
            viewport_height_px: None,
            booking_completed: false,
            closed: false,
        }
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        OverlaySnapshot {
            header_title: HEADER_TITLE,
            header_subtitle: self.service_name.clone(),
            online: self.online,
            panel: self.panel(),
            viewport_height_px: self.viewport_height_px,
            booking_completed: self.booking_completed,
            closed: self.closed,
        }
    }

    /// Feed one session event into the reducer.
    pub fn handle_event(&mut self, event: &EmbedEvent) {
        if self.closed {
            trace!(?event, "event after close ignored");
            return;
        }
        match event {
            EmbedEvent::PhaseChanged {
                view,
                attempt_count,
            } => {
                self.view = *view;
                self.attempt_count = *attempt_count;
            }
            EmbedEvent::ConnectivityChanged { online } => {
                self.online = *online;
            }
            EmbedEvent::ViewportResized { height_px } => {
                self.viewport_height_px = Some(*height_px);
            }
            EmbedEvent::BookingCompleted => {
                debug!(service = %self.service_name, "booking completed");
                self.booking_completed = true;
            }
            EmbedEvent::Closed => {
                self.closed = true;
            }
            EmbedEvent::AttemptStarted { .. }
            | EmbedEvent::AttemptFailed { .. }
            | EmbedEvent::MessageDiscarded { .. }
            | EmbedEvent::ExternalOpened { .. } => {}
        }
    }

    fn panel(&self) -> OverlayPanel {
        match self.view {
            ViewPhase::Loading => OverlayPanel::Loading {
                text: LOADING_TEXT,
                attempt_label: (self.attempt_count > 0).then(|| {
                    format!(
                        "Attempt {} of {}",
                        self.attempt_count.saturating_add(1),
                        self.max_attempts.saturating_add(1)
                    )
                }),
            },
            ViewPhase::Offline => OverlayPanel::Offline {
                title: OFFLINE_TITLE,
                text: OFFLINE_TEXT,
                retry_enabled: self.online,
                contact_phone: self.contact_phone.clone(),
            },
            ViewPhase::Error => OverlayPanel::Error {
                title: ERROR_TITLE,
                text: ERROR_TEXT,
                can_retry: true,
                can_open_externally: true,
                contact_phone: self.contact_phone.clone(),
            },
            ViewPhase::Ready => OverlayPanel::Frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embed_core::{AttemptId, FailureCause};

    fn state() -> OverlayState {
        OverlayState::new("Haircut", 3, Some("+46 36 12 34 56".to_owned()), true)
    }

    fn phase(view: ViewPhase, attempt_count: u32) -> EmbedEvent {
        EmbedEvent::PhaseChanged {
            view,
            attempt_count,
        }
    }

    #[test]
    fn starts_loading_without_attempt_label() {
        let snapshot = state().snapshot();
        assert_eq!(snapshot.header_title, "Secure Booking");
        assert_eq!(snapshot.header_subtitle, "Haircut");
        assert_eq!(
            snapshot.panel,
            OverlayPanel::Loading {
                text: LOADING_TEXT,
                attempt_label: None
            }
        );
    }

    #[test]
    fn labels_automatic_retries() {
        let mut state = state();
        state.handle_event(&EmbedEvent::AttemptFailed {
            attempt: AttemptId::new(1),
            cause: FailureCause::Timeout,
        });
        state.handle_event(&phase(ViewPhase::Loading, 1));

        let OverlayPanel::Loading { attempt_label, .. } = state.snapshot().panel else {
            panic!("expected loading panel");
        };
        assert_eq!(attempt_label.as_deref(), Some("Attempt 2 of 4"));
    }

    #[test]
    fn ready_shows_frame() {
        let mut state = state();
        state.handle_event(&phase(ViewPhase::Loading, 2));
        state.handle_event(&phase(ViewPhase::Ready, 0));
        assert_eq!(state.snapshot().panel, OverlayPanel::Frame);
    }

    #[test]
    fn offline_panel_disables_retry_until_online() {
        let mut state = state();
        state.handle_event(&EmbedEvent::ConnectivityChanged { online: false });
        state.handle_event(&phase(ViewPhase::Offline, 0));

        let snapshot = state.snapshot();
        assert!(!snapshot.online);
        assert_eq!(
            snapshot.panel,
            OverlayPanel::Offline {
                title: OFFLINE_TITLE,
                text: OFFLINE_TEXT,
                retry_enabled: false,
                contact_phone: Some("+46 36 12 34 56".to_owned()),
            }
        );

        state.handle_event(&EmbedEvent::ConnectivityChanged { online: true });
        state.handle_event(&phase(ViewPhase::Loading, 0));
        assert!(matches!(state.snapshot().panel, OverlayPanel::Loading { .. }));
    }

    #[test]
    fn error_panel_offers_retry_and_browser() {
        let mut state = OverlayState::new("Haircut", 3, None, true);
        state.handle_event(&phase(ViewPhase::Error, 3));
        assert_eq!(
            state.snapshot().panel,
            OverlayPanel::Error {
                title: ERROR_TITLE,
                text: ERROR_TEXT,
                can_retry: true,
                can_open_externally: true,
                contact_phone: None,
            }
        );
    }

    #[test]
    fn closed_state_ignores_later_events() {
        let mut state = state();
        state.handle_event(&EmbedEvent::ViewportResized { height_px: 700 });
        state.handle_event(&EmbedEvent::BookingCompleted);
        state.handle_event(&EmbedEvent::Closed);
        state.handle_event(&phase(ViewPhase::Error, 3));

        let snapshot = state.snapshot();
        assert!(snapshot.closed);
        assert!(snapshot.booking_completed);
        assert_eq!(snapshot.viewport_height_px, Some(700));
        assert!(matches!(snapshot.panel, OverlayPanel::Loading { .. }));
    }
}
