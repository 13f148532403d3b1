//! In-memory transport.
//!
//! A linked pair of endpoints backed by tokio channels. Used to embed the
//! emulator next to a controller in the same process, and by the tests.

use tokio::sync::mpsc;

use super::Message;
use crate::core::{Transport, TransportError};

/// One end of an in-memory link.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl ChannelTransport {
    /// Create two connected endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: a_tx, rx: a_rx },
            Self { tx: b_tx, rx: b_rx },
        )
    }

    /// Receive without waiting. Returns `None` if nothing is queued.
    pub fn try_receive(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

impl Transport for ChannelTransport {
    async fn receive_message(&mut self) -> Result<Message, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }

    async fn send_message(&mut self, message: Message) -> Result<(), TransportError> {
        self.tx.send(message).map_err(|_| TransportError::Closed)
    }
}
