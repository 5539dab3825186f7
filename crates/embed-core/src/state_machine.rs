use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::{
    decorate::{external_url, parse_target_url, request_url},
    error::EmbedError,
    message::{FrameMessage, MessageVerdict, OriginPolicy, classify_message},
    retry::LoadPolicy,
    types::{
        AttemptId, EmbedEffect, EmbedEvent, FailureCause, FrameAttributes, FrameRequest,
        LoadPhase, RequestContext, SessionSpec, ViewPhase,
    },
};

/// One embedded-content load session, from overlay open to close.
///
/// Every input returns the effects the runtime must perform. Inputs tagged
/// with an [`AttemptId`] are ignored unless they refer to the current
/// attempt, so a late callback from an earlier attempt cannot change state.
/// Once closed, every input is ignored.
#[derive(Debug, Clone)]
pub struct LoadSession {
    session_id: Uuid,
    target: Url,
    origin_policy: OriginPolicy,
    frame_attributes: FrameAttributes,
    policy: LoadPolicy,
    phase: LoadPhase,
    attempt_count: u32,
    current_attempt: AttemptId,
    online: bool,
    closed: bool,
}

impl LoadSession {
    pub fn new(spec: &SessionSpec, policy: LoadPolicy, online: bool) -> Result<Self, EmbedError> {
        let target = parse_target_url(&spec.target_url)?;
        let origin_policy = OriginPolicy::for_target(&target)
            .ok_or_else(|| EmbedError::invalid_target(&spec.target_url, "missing host"))?;

        Ok(Self {
            session_id: Uuid::new_v4(),
            target,
            origin_policy,
            frame_attributes: FrameAttributes::for_service(&spec.service_name),
            policy,
            phase: LoadPhase::Loading,
            attempt_count: 0,
            current_attempt: AttemptId::new(0),
            online,
            closed: false,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn policy(&self) -> &LoadPolicy {
        &self.policy
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn view(&self) -> ViewPhase {
        ViewPhase::resolve(self.phase, self.online)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn current_attempt(&self) -> AttemptId {
        self.current_attempt
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Issue a load of the decorated target and arm a fresh timer.
    pub fn start(&mut self, ctx: RequestContext) -> Vec<EmbedEffect> {
        if self.closed {
            return Vec::new();
        }

        self.phase = LoadPhase::Loading;
        self.current_attempt = self.current_attempt.next();
        let attempt = self.current_attempt;
        let url = request_url(
            &self.target,
            self.policy.decoration(),
            self.attempt_count,
            ctx,
        )
        .to_string();

        vec![
            EmbedEffect::CancelTimeout,
            EmbedEffect::LoadFrame(FrameRequest {
                attempt,
                url: url.clone(),
                attributes: self.frame_attributes.clone(),
            }),
            EmbedEffect::ArmTimeout {
                attempt,
                after: self.policy.load_timeout(),
            },
            EmbedEffect::Emit(EmbedEvent::AttemptStarted {
                attempt,
                attempt_count: self.attempt_count,
                url,
            }),
            self.phase_changed(),
        ]
    }

    /// Native load-completion signal for `attempt`.
    pub fn on_frame_loaded(&mut self, attempt: AttemptId) -> Vec<EmbedEffect> {
        if !self.is_current(attempt) {
            return Vec::new();
        }
        self.succeed()
    }

    /// Native load-error signal for `attempt`.
    pub fn on_frame_error(&mut self, attempt: AttemptId, ctx: RequestContext) -> Vec<EmbedEffect> {
        self.fail(attempt, FailureCause::FrameError, ctx)
    }

    /// Timer expiry for `attempt`.
    pub fn on_timeout(&mut self, attempt: AttemptId, ctx: RequestContext) -> Vec<EmbedEffect> {
        self.fail(attempt, FailureCause::Timeout, ctx)
    }

    /// The host could not issue the frame load for `attempt`.
    pub fn on_load_rejected(
        &mut self,
        attempt: AttemptId,
        ctx: RequestContext,
    ) -> Vec<EmbedEffect> {
        self.fail(attempt, FailureCause::HostRejected, ctx)
    }

    /// Cross-origin message from the embedded content.
    ///
    /// Trusted `iframe_loaded`/`iframe_error` messages act on the current
    /// attempt. Untrusted or malformed messages never change state.
    pub fn on_message(
        &mut self,
        origin: &str,
        payload: &Value,
        ctx: RequestContext,
    ) -> Vec<EmbedEffect> {
        if self.closed {
            return Vec::new();
        }

        match classify_message(&self.origin_policy, origin, payload) {
            MessageVerdict::Accepted(FrameMessage::Loaded) => {
                self.on_frame_loaded(self.current_attempt)
            }
            MessageVerdict::Accepted(FrameMessage::Error) => {
                self.fail(self.current_attempt, FailureCause::Reported, ctx)
            }
            MessageVerdict::Accepted(FrameMessage::BookingComplete) => {
                vec![EmbedEffect::Emit(EmbedEvent::BookingCompleted)]
            }
            MessageVerdict::Discarded(reason) => {
                vec![EmbedEffect::Emit(EmbedEvent::MessageDiscarded { reason })]
            }
        }
    }

    /// Mirror platform connectivity. Never retries; the load phase is kept
    /// so coming back online restores whatever was showing before.
    pub fn set_online(&mut self, online: bool) -> Vec<EmbedEffect> {
        if self.closed || self.online == online {
            return Vec::new();
        }
        self.online = online;
        vec![
            EmbedEffect::Emit(EmbedEvent::ConnectivityChanged { online }),
            self.phase_changed(),
        ]
    }

    /// User-invoked retry. Not subject to the automatic cap.
    pub fn retry(&mut self, ctx: RequestContext) -> Vec<EmbedEffect> {
        if self.closed {
            return Vec::new();
        }
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.start(ctx)
    }

    /// Open the undecorated target outside the overlay, then close.
    pub fn open_externally(&mut self) -> Vec<EmbedEffect> {
        if self.closed {
            return Vec::new();
        }
        let mut effects = vec![EmbedEffect::OpenExternal {
            url: external_url(&self.target).to_string(),
        }];
        effects.extend(self.close());
        effects
    }

    /// Tear the session down. Idempotent: only the first call has effects.
    pub fn close(&mut self) -> Vec<EmbedEffect> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        vec![
            EmbedEffect::CancelTimeout,
            EmbedEffect::Close,
            EmbedEffect::Emit(EmbedEvent::Closed),
        ]
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        !self.closed && attempt == self.current_attempt && self.phase == LoadPhase::Loading
    }

    fn succeed(&mut self) -> Vec<EmbedEffect> {
        self.phase = LoadPhase::Ready;
        self.attempt_count = 0;
        vec![EmbedEffect::CancelTimeout, self.phase_changed()]
    }

    fn fail(
        &mut self,
        attempt: AttemptId,
        cause: FailureCause,
        ctx: RequestContext,
    ) -> Vec<EmbedEffect> {
        if !self.is_current(attempt) {
            return Vec::new();
        }

        let mut effects = vec![EmbedEffect::Emit(EmbedEvent::AttemptFailed { attempt, cause })];
        if self.policy.allows_automatic_retry(self.attempt_count) {
            self.attempt_count += 1;
            effects.extend(self.start(ctx));
            return effects;
        }

        self.phase = LoadPhase::Error;
        effects.push(EmbedEffect::CancelTimeout);
        effects.push(self.phase_changed());
        effects
    }

    fn phase_changed(&self) -> EmbedEffect {
        EmbedEffect::Emit(EmbedEvent::PhaseChanged {
            view: self.view(),
            attempt_count: self.attempt_count,
        })
    }
}
