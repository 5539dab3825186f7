//! Headless run of one overlay session against the in-memory platform.
//!
//! The script lets the first two attempts time out, answers the third with
//! a trusted `iframe_loaded` message and closes once the frame is shown.

use std::sync::Arc;

use embed_core::{EmbedError, EmbedEvent, FrameSignal, LoadPolicy, ViewPhase};
use embed_platform::fake::FakePlatform;
use embed_runtime::spawn_session;
use serde_json::json;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::{
    config::OverlayConfig,
    state::{OverlaySnapshot, OverlayState},
};

/// Per-attempt timeout used instead of the configured one.
const REHEARSAL_TIMEOUT_MS: u64 = 250;
const TIMEOUTS_BEFORE_LOAD: u32 = 2;

#[derive(Debug, Error)]
pub enum RehearsalError {
    #[error("session failed to start: {0}")]
    Session(#[from] EmbedError),
    #[error("event stream ended before the overlay closed")]
    StreamEnded,
}

pub async fn run(config: &OverlayConfig) -> Result<OverlaySnapshot, RehearsalError> {
    let policy = LoadPolicy::new(REHEARSAL_TIMEOUT_MS, config.policy.max_attempts())
        .with_decoration(config.policy.decoration())
        .with_external_open_grace_ms(config.policy.external_open_grace_ms());
    let (platform, signals, controls) = FakePlatform::default().build();
    let origin = config.booking_url.origin().ascii_serialization();

    let (handle, mut events) = spawn_session(
        config.session_spec(),
        policy,
        platform,
        signals,
        Arc::new(|| info!("overlay dismissed")),
    )?;
    let mut state = OverlayState::new(
        config.service_name.as_str(),
        policy.max_attempts(),
        config.contact_phone.clone(),
        true,
    );

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "rehearsal lagged behind session events");
                continue;
            }
            Err(RecvError::Closed) => return Err(RehearsalError::StreamEnded),
        };
        state.handle_event(&event);
        let snapshot = state.snapshot();
        info!(
            ?event,
            header = snapshot.header_title,
            service = %snapshot.header_subtitle,
            panel = ?snapshot.panel,
            online = snapshot.online,
            viewport_height_px = ?snapshot.viewport_height_px,
            booking_completed = snapshot.booking_completed,
            "overlay snapshot"
        );

        match event {
            EmbedEvent::AttemptStarted { attempt_count, .. }
                if attempt_count == TIMEOUTS_BEFORE_LOAD =>
            {
                let delivered = controls
                    .signal(FrameSignal::Message {
                        origin: origin.clone(),
                        payload: json!({ "type": "iframe_loaded" }),
                    })
                    .await;
                if !delivered {
                    warn!("session stopped listening before the load signal");
                }
            }
            EmbedEvent::PhaseChanged {
                view: ViewPhase::Ready | ViewPhase::Error,
                ..
            } => handle.close(),
            EmbedEvent::Closed => break,
            _ => {}
        }
    }

    info!(loads = controls.frame.requests().len(), "rehearsal finished");
    handle.join().await;
    Ok(state.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OverlayPanel;
    use std::path::PathBuf;
    use url::Url;

    fn config(max_attempts: u32) -> OverlayConfig {
        OverlayConfig {
            booking_url: Url::parse("https://booking.example.com/widget").expect("valid url"),
            service_name: "Haircut".to_owned(),
            policy: LoadPolicy::new(10_000, max_attempts),
            pwa_out_dir: PathBuf::from("unused"),
            app_name: "Barber 96".to_owned(),
            app_short_name: "Barber".to_owned(),
            theme_color: "#1A1A1A".to_owned(),
            contact_phone: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_third_attempt_and_closes() {
        let snapshot = run(&config(3)).await.expect("rehearsal should finish");
        assert!(snapshot.closed);
        assert_eq!(snapshot.panel, OverlayPanel::Frame);
    }

    #[tokio::test(start_paused = true)]
    async fn ends_in_error_when_retries_run_out_first() {
        let snapshot = run(&config(1)).await.expect("rehearsal should finish");
        assert!(snapshot.closed);
        assert!(matches!(snapshot.panel, OverlayPanel::Error { .. }));
    }
}
