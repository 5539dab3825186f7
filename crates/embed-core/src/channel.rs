use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{EmbedCommand, EmbedEvent};

/// Broadcast event stream type used by overlay subscribers.
pub type EventStream = broadcast::Receiver<EmbedEvent>;

/// Emitting half handed to the session runtime.
pub type EventSender = broadcast::Sender<EmbedEvent>;

/// Errors returned by channel operations.
#[derive(Debug, Error)]
pub enum EmbedChannelError {
    /// The session runtime is gone (closed or torn down).
    #[error("command channel is closed")]
    CommandChannelClosed,
}

/// Command/event channel pair shared by the session runtime and its handle.
#[derive(Clone, Debug)]
pub struct EmbedChannels {
    command_tx: mpsc::Sender<EmbedCommand>,
    event_tx: broadcast::Sender<EmbedEvent>,
}

impl EmbedChannels {
    /// Create a new channel set and return it with the command receiver.
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<EmbedCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (
            Self {
                command_tx,
                event_tx,
            },
            command_rx,
        )
    }

    /// Subscribe to emitted events.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Event sender without the command half, so holding it does not keep
    /// the command channel open.
    pub fn event_sender(&self) -> EventSender {
        self.event_tx.clone()
    }

    /// Send one command to the runtime.
    pub async fn send_command(&self, command: EmbedCommand) -> Result<(), EmbedChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| EmbedChannelError::CommandChannelClosed)
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: EmbedEvent) {
        let _ = self.event_tx.send(event);
    }
}
