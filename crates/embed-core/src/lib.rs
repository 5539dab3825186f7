//! Core contract for the embedded booking overlay.
//!
//! This crate defines the load session state machine, the command/event
//! protocol, request URL decoration, the cross-origin message contract and
//! the common error/channel abstractions. It performs no I/O and owns no
//! timers; the runtime executes the effects it returns.

/// Async command/event channel primitives.
pub mod channel;
/// Request and external URL derivation.
pub mod decorate;
/// Stable error types and categories.
pub mod error;
/// Cross-origin message validation.
pub mod message;
/// Retry and timeout policy for load attempts.
pub mod retry;
/// Load session state machine.
pub mod state_machine;
/// Protocol types (commands, signals, events, effects).
pub mod types;

pub use channel::{EmbedChannelError, EmbedChannels, EventSender, EventStream};
pub use decorate::{external_url, is_mobile_user_agent, parse_target_url, request_url};
pub use error::{EmbedError, EmbedErrorCategory};
pub use message::{FrameMessage, MessageVerdict, OriginPolicy, classify_message};
pub use retry::LoadPolicy;
pub use state_machine::LoadSession;
pub use types::{
    AttemptId, DiscardReason, EmbedCommand, EmbedEffect, EmbedEvent, FailureCause,
    FrameAttributes, FrameRequest, FrameSignal, LoadPhase, RequestContext, SessionSpec,
    UrlDecoration, ViewPhase,
};
