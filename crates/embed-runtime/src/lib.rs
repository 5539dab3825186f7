//! Async driver for one embedded booking load session.
//!
//! [`spawn_session`] locks the host page, starts a task that owns a
//! [`LoadSession`] and the single attempt timer, and returns a
//! [`SessionHandle`] together with the first event subscription. The platform
//! subscriptions and the page lock live in a slot shared by the handle and
//! the task, so closing releases them immediately.

use std::{
    collections::VecDeque,
    fmt,
    future::{Future, pending, poll_fn},
    pin::Pin,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use embed_core::{
    AttemptId, EmbedChannelError, EmbedChannels, EmbedCommand, EmbedEffect, EmbedError,
    EmbedEvent, EventSender, EventStream, FrameRequest, FrameSignal, LoadPolicy, LoadSession,
    RequestContext, SessionSpec, is_mobile_user_agent,
};
use embed_platform::{EXTERNAL_WINDOW_FEATURES, Navigator, PageLock, Platform, PlatformSignals};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, sleep_until},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Viewport updates are coalesced over this window before being emitted.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

const COMMAND_BUFFER: usize = 16;
const EVENT_BUFFER: usize = 128;

/// Caller-supplied dismissal callback.
pub type CloseCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Fires the close callback at most once, whoever closes first.
struct CloseLatch {
    fired: AtomicBool,
    callback: CloseCallback,
}

impl CloseLatch {
    fn new(callback: CloseCallback) -> Self {
        Self {
            fired: AtomicBool::new(false),
            callback,
        }
    }

    fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        (self.callback)();
        true
    }
}

type Changed<T> = Pin<Box<dyn Future<Output = (bool, watch::Receiver<T>)> + Send>>;

fn next_change<T>(mut receiver: watch::Receiver<T>) -> Changed<T>
where
    T: Send + Sync + 'static,
{
    Box::pin(async move {
        let alive = receiver.changed().await.is_ok();
        (alive, receiver)
    })
}

fn poll_change<T>(slot: &mut Option<Changed<T>>, cx: &mut Context<'_>) -> Option<T>
where
    T: Copy + Send + Sync + 'static,
{
    let changed = slot.as_mut()?;
    let Poll::Ready((alive, mut receiver)) = changed.as_mut().poll(cx) else {
        return None;
    };
    if !alive {
        *slot = None;
        return None;
    }
    let value = *receiver.borrow_and_update();
    *slot = Some(next_change(receiver));
    Some(value)
}

enum PlatformUpdate {
    Frame(FrameSignal),
    Connectivity(bool),
    Viewport(u32),
}

/// What a mounted session holds on the host page.
struct Attachment {
    frame: Option<mpsc::Receiver<FrameSignal>>,
    connectivity: Option<Changed<bool>>,
    viewport: Option<Changed<u32>>,
    _page_lock: Option<PageLock>,
}

impl Attachment {
    fn new(signals: PlatformSignals, page_lock: Option<PageLock>) -> Self {
        let PlatformSignals {
            connectivity,
            viewport_height,
            frame,
        } = signals;
        Self {
            frame: Some(frame),
            connectivity: Some(next_change(connectivity)),
            viewport: Some(next_change(viewport_height)),
            _page_lock: page_lock,
        }
    }

    fn poll_update(&mut self, cx: &mut Context<'_>) -> Poll<PlatformUpdate> {
        if let Some(frame) = self.frame.as_mut() {
            match frame.poll_recv(cx) {
                Poll::Ready(Some(signal)) => return Poll::Ready(PlatformUpdate::Frame(signal)),
                Poll::Ready(None) => self.frame = None,
                Poll::Pending => {}
            }
        }
        if let Some(online) = poll_change(&mut self.connectivity, cx) {
            return Poll::Ready(PlatformUpdate::Connectivity(online));
        }
        if let Some(height_px) = poll_change(&mut self.viewport, cx) {
            return Poll::Ready(PlatformUpdate::Viewport(height_px));
        }
        Poll::Pending
    }
}

/// Attachment shared by the handle and the runtime task.
///
/// The lock is only held while polling, never across an await.
#[derive(Clone)]
struct AttachmentSlot(Arc<Mutex<Option<Attachment>>>);

impl AttachmentSlot {
    fn new(attachment: Attachment) -> Self {
        Self(Arc::new(Mutex::new(Some(attachment))))
    }

    fn lock(&self) -> MutexGuard<'_, Option<Attachment>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop the subscriptions and restore the host page.
    ///
    /// Returns `false` when the attachment was already released.
    fn release(&self) -> bool {
        let attachment = self.lock().take();
        attachment.is_some()
    }

    /// Next platform update, or `None` once released.
    async fn next_update(&self) -> Option<PlatformUpdate> {
        poll_fn(|cx| match self.lock().as_mut() {
            Some(attachment) => attachment.poll_update(cx).map(Some),
            None => Poll::Ready(None),
        })
        .await
    }
}

/// Handle to a running session.
///
/// Dropping the handle stops the session and releases the host page without
/// running the close callback.
pub struct SessionHandle {
    channels: EmbedChannels,
    cancel: CancellationToken,
    latch: Arc<CloseLatch>,
    attachment: AttachmentSlot,
    task: Option<JoinHandle<()>>,
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    /// Additional subscription; events emitted before this call are not seen.
    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// Manual retry; allowed after automatic retries are exhausted.
    pub async fn retry(&self) -> Result<(), EmbedChannelError> {
        self.channels.send_command(EmbedCommand::Retry).await
    }

    pub async fn open_externally(&self) -> Result<(), EmbedChannelError> {
        self.channels.send_command(EmbedCommand::OpenExternally).await
    }

    /// Close the overlay.
    ///
    /// Before returning, the platform subscriptions are dropped, the host
    /// page is restored and the close callback has run. The callback runs
    /// once no matter how many times this is called. The runtime stops at
    /// its next poll without touching session state.
    pub fn close(&self) {
        self.cancel.cancel();
        if self.attachment.release() {
            debug!("host page released by caller");
        }
        if self.latch.fire() {
            debug!("overlay closed by caller");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the runtime task to finish its teardown.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.attachment.release();
    }
}

/// Start a load session on the current tokio runtime.
///
/// The returned stream is subscribed before the task starts, so it sees the
/// first attempt.
pub fn spawn_session(
    spec: SessionSpec,
    policy: LoadPolicy,
    platform: Platform,
    signals: PlatformSignals,
    on_close: CloseCallback,
) -> Result<(SessionHandle, EventStream), EmbedError> {
    let online = *signals.connectivity.borrow();
    let session = LoadSession::new(&spec, policy, online)?;
    let session_id = session.session_id();
    info!(
        %session_id,
        target = %session.target(),
        service = %spec.service_name,
        online,
        "opening booking overlay"
    );

    let page_lock = match PageLock::acquire(Arc::clone(&platform.host_page)) {
        Ok(lock) => Some(lock),
        Err(err) => {
            warn!(%session_id, error = %err, "host page lock unavailable; continuing unlocked");
            None
        }
    };
    let attachment = AttachmentSlot::new(Attachment::new(signals, page_lock));

    let (channels, command_rx) = EmbedChannels::new(COMMAND_BUFFER, EVENT_BUFFER);
    let events = channels.subscribe();
    let cancel = CancellationToken::new();
    let latch = Arc::new(CloseLatch::new(on_close));

    let runtime = SessionRuntime {
        session,
        platform,
        attachment: attachment.clone(),
        command_rx,
        events: channels.event_sender(),
        cancel: cancel.clone(),
        latch: Arc::clone(&latch),
        timer: None,
        pending_resize: None,
    };
    let task = tokio::spawn(runtime.run());

    let handle = SessionHandle {
        channels,
        cancel,
        latch,
        attachment,
        task: Some(task),
    };
    Ok((handle, events))
}

#[derive(Debug, Clone, Copy)]
struct ArmedTimer {
    attempt: AttemptId,
    deadline: Instant,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

struct SessionRuntime {
    session: LoadSession,
    platform: Platform,
    attachment: AttachmentSlot,
    command_rx: mpsc::Receiver<EmbedCommand>,
    events: EventSender,
    cancel: CancellationToken,
    latch: Arc<CloseLatch>,
    timer: Option<ArmedTimer>,
    pending_resize: Option<(u32, Instant)>,
}

impl SessionRuntime {
    async fn run(mut self) {
        let session_id = self.session.session_id();
        let ctx = self.request_context();
        let effects = self.session.start(ctx);
        self.apply(effects);

        while !self.session.is_closed() {
            let timer = self.timer;
            let resize_deadline = self.pending_resize.map(|(_, deadline)| deadline);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                update = self.attachment.next_update() => match update {
                    Some(update) => self.handle_platform_update(update),
                    None => break,
                },
                _ = wait_until(resize_deadline) => {
                    if let Some((height_px, _)) = self.pending_resize.take() {
                        self.emit(EmbedEvent::ViewportResized { height_px });
                    }
                }
                _ = wait_until(timer.map(|t| t.deadline)) => {
                    self.timer = None;
                    if let Some(timer) = timer {
                        debug!(%session_id, attempt = %timer.attempt, "load attempt timed out");
                        let ctx = self.request_context();
                        let effects = self.session.on_timeout(timer.attempt, ctx);
                        self.apply(effects);
                    }
                }
            }
        }

        self.timer = None;
        self.pending_resize = None;
        if !self.session.is_closed() {
            // Closed or dropped from the handle: report the close without further work.
            for effect in self.session.close() {
                if let EmbedEffect::Emit(event) = effect {
                    self.emit(event);
                }
            }
        }
        self.attachment.release();
        debug!(%session_id, "booking overlay torn down");
    }

    fn request_context(&self) -> RequestContext {
        RequestContext {
            now_ms: self.platform.clock.now_ms(),
            mobile: is_mobile_user_agent(&self.platform.user_agent.user_agent()),
        }
    }

    fn handle_command(&mut self, command: EmbedCommand) {
        debug!(session_id = %self.session.session_id(), ?command, "overlay command");
        let effects = match command {
            EmbedCommand::Retry => {
                let ctx = self.request_context();
                self.session.retry(ctx)
            }
            EmbedCommand::OpenExternally => self.session.open_externally(),
            EmbedCommand::Close => self.session.close(),
        };
        self.apply(effects);
    }

    fn handle_platform_update(&mut self, update: PlatformUpdate) {
        match update {
            PlatformUpdate::Frame(signal) => self.handle_frame_signal(signal),
            PlatformUpdate::Connectivity(online) => {
                let effects = self.session.set_online(online);
                self.apply(effects);
            }
            PlatformUpdate::Viewport(height_px) => {
                self.pending_resize = Some((height_px, Instant::now() + RESIZE_DEBOUNCE));
            }
        }
    }

    fn handle_frame_signal(&mut self, signal: FrameSignal) {
        let ctx = self.request_context();
        let effects = match signal {
            FrameSignal::Loaded { attempt } => self.session.on_frame_loaded(attempt),
            FrameSignal::Failed { attempt } => self.session.on_frame_error(attempt, ctx),
            FrameSignal::Message { origin, payload } => {
                self.session.on_message(&origin, &payload, ctx)
            }
        };
        self.apply(effects);
    }

    fn apply(&mut self, effects: Vec<EmbedEffect>) {
        let mut queue: VecDeque<EmbedEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                EmbedEffect::LoadFrame(request) => {
                    if let Err(rejected) = self.load_frame(&request) {
                        queue.extend(rejected);
                    }
                }
                EmbedEffect::ArmTimeout { attempt, after } => {
                    self.timer = Some(ArmedTimer {
                        attempt,
                        deadline: Instant::now() + after,
                    });
                }
                EmbedEffect::CancelTimeout => self.timer = None,
                EmbedEffect::OpenExternal { url } => self.open_external(url),
                EmbedEffect::Close => {
                    self.cancel.cancel();
                    self.attachment.release();
                    self.latch.fire();
                }
                EmbedEffect::Emit(event) => self.emit(event),
            }
        }
    }

    fn load_frame(&mut self, request: &FrameRequest) -> Result<(), Vec<EmbedEffect>> {
        info!(
            session_id = %self.session.session_id(),
            attempt = %request.attempt,
            attempt_count = self.session.attempt_count(),
            url = %request.url,
            "loading booking frame"
        );
        match self.platform.frame.load(request) {
            Ok(()) => Ok(()),
            Err(err) => {
                warn!(attempt = %request.attempt, error = %err, "host rejected frame load");
                let ctx = self.request_context();
                Err(self.session.on_load_rejected(request.attempt, ctx))
            }
        }
    }

    fn open_external(&self, url: String) {
        let navigator = Arc::clone(&self.platform.navigator);
        let grace = self.session.policy().external_open_grace();
        let events = self.events.clone();
        tokio::spawn(async move {
            let navigated = open_or_navigate(navigator.as_ref(), &url, grace).await;
            let _ = events.send(EmbedEvent::ExternalOpened { url, navigated });
        });
    }

    /// Log and broadcast; emission is best-effort when nobody listens.
    fn emit(&self, event: EmbedEvent) {
        let session_id = self.session.session_id();
        match &event {
            EmbedEvent::PhaseChanged {
                view,
                attempt_count,
            } => debug!(%session_id, ?view, attempt_count, "phase changed"),
            EmbedEvent::AttemptFailed { attempt, cause } => {
                let code = EmbedError::attempt_failed(*cause).code;
                warn!(%session_id, %attempt, %code, "load attempt failed")
            }
            EmbedEvent::MessageDiscarded { reason } => {
                debug!(%session_id, ?reason, "discarded frame message")
            }
            EmbedEvent::BookingCompleted => info!(%session_id, "booking completed"),
            _ => {}
        }
        let _ = self.events.send(event);
    }
}

/// Open `url` in a new browsing context, navigating the current page when
/// the context cannot be opened or is gone after `grace`.
///
/// Returns `true` when the fallback navigation was used.
pub async fn open_or_navigate(navigator: &dyn Navigator, url: &str, grace: Duration) -> bool {
    let opened = match navigator.open_window(url, EXTERNAL_WINDOW_FEATURES) {
        Ok(context) => {
            tokio::time::sleep(grace).await;
            context.is_open()
        }
        Err(err) => {
            debug!(error = %err, "external window refused");
            false
        }
    };
    if opened {
        return false;
    }

    if let Err(err) = navigator.navigate(url) {
        warn!(error = %err, url, "fallback navigation failed");
    }
    true
}
