use crate::codec::{ChnlzrCodec, CodecError, Message};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, sleep_until};
use tokio_util::codec::Framed;
use tracing::trace;

/// One framed link to a host.
///
/// Reading through [`ChnlzrConnection::recv`] writes a heartbeat whenever
/// nothing was written for `idle_threshold`, so an idle lease is not reaped
/// by the host.
pub struct ChnlzrConnection<T> {
    framed: Framed<T, ChnlzrCodec>,
    idle_threshold: Duration,
    last_write: Instant,
}

impl<T> ChnlzrConnection<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(transport: T, idle_threshold: Duration) -> Self {
        Self {
            framed: Framed::new(transport, ChnlzrCodec),
            idle_threshold,
            last_write: Instant::now(),
        }
    }

    pub async fn send(&mut self, message: Message) -> Result<(), CodecError> {
        self.framed.send(message).await?;
        self.last_write = Instant::now();
        Ok(())
    }

    /// Next inbound message, `None` once the host closed the connection.
    pub async fn recv(&mut self) -> Option<Result<Message, CodecError>> {
        loop {
            let deadline = self.last_write + self.idle_threshold;
            tokio::select! {
                frame = self.framed.next() => return frame,
                _ = sleep_until(deadline) => {
                    trace!("link idle, writing heartbeat");
                    if let Err(err) = self.send(Message::Heartbeat).await {
                        return Some(Err(err));
                    }
                }
            }
        }
    }

    /// Flushes and shuts the transport down. Consumes the connection, so it
    /// can only happen once.
    pub async fn close(mut self) {
        if let Err(err) = self.framed.close().await {
            trace!("error while closing chnlzr connection: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_link_writes_heartbeats() {
        let (client, server) = tokio::io::duplex(1024);
        let mut client = ChnlzrConnection::new(client, Duration::from_millis(500));
        let mut server = Framed::new(server, ChnlzrCodec);

        let reader = tokio::spawn(async move { client.recv().await.map(|r| r.is_ok()) });

        assert_eq!(server.next().await.unwrap().unwrap(), Message::Heartbeat);
        assert_eq!(server.next().await.unwrap().unwrap(), Message::Heartbeat);

        server.send(Message::Heartbeat).await.unwrap();
        assert_eq!(reader.await.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_close_is_seen_as_eof() {
        let (client, server) = tokio::io::duplex(1024);
        let client = ChnlzrConnection::new(client, Duration::from_secs(30));
        let mut server = Framed::new(server, ChnlzrCodec);

        client.close().await;
        assert!(server.next().await.is_none());
    }
}
