//! Stream transport over any async byte stream.
//!
//! Frames are the 15-byte message header followed by the payload it
//! announces, so no extra length prefix is needed. The emulator binary runs
//! this over a TCP connection standing in for the wireless link.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use super::Message;
use crate::core::{MESSAGE_HEADER_SIZE, Transport, TransportError};

/// [`Transport`] over an `AsyncRead + AsyncWrite` stream.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn receive_message(&mut self) -> Result<Message, TransportError> {
        let mut header = [0u8; MESSAGE_HEADER_SIZE];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(TransportError::Closed);
            }
            Err(e) => return Err(e.into()),
        }

        let (mut message, len) = Message::parse_header(&header)?;
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload).await?;
        message.payload = payload;

        trace!(?message, "received frame");
        Ok(message)
    }

    async fn send_message(&mut self, message: Message) -> Result<(), TransportError> {
        let bytes = message.to_bytes()?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(?message, "sent frame");
        Ok(())
    }
}
