//! Streaming side of a negotiated channel.

use crate::codec::{Capabilities, ChannelState, Message};
use crate::connection::ChnlzrConnection;
use crate::error::ChnlzrError;
use crate::negotiation::{Established, Phase};
use bytes::{Buf, Bytes};
use p25model::HostId;
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// One I/Q sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    /// Decodes interleaved big-endian `f32` pairs.
    pub fn from_interleaved(mut payload: Bytes) -> Vec<Complex> {
        let mut samples = Vec::with_capacity(payload.len() / 8);
        while payload.remaining() >= 8 {
            samples.push(Complex {
                re: payload.get_f32(),
                im: payload.get_f32(),
            });
        }
        samples
    }
}

/// What a streaming source delivers to its consumer.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Always the first event, then again every time the host retunes.
    StateChanged(ChannelState),
    Samples(Arc<[Complex]>),
}

type CloseOutcome = Option<Result<(), ChnlzrError>>;

/// Release operation and completion signal of a source. Cheap to clone.
#[derive(Clone)]
pub struct SourceCloser {
    release: CancellationToken,
    closed: watch::Receiver<CloseOutcome>,
}

impl SourceCloser {
    /// Asks the streaming task to close the connection. Idempotent.
    pub fn release(&self) {
        self.release.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Resolves when the connection is closed: `Ok` after a release or an
    /// orderly close by the host, the cause otherwise.
    pub async fn closed(&self) -> Result<(), ChnlzrError> {
        let mut closed = self.closed.clone();
        let outcome = closed.wait_for(Option::is_some).await.map(|o| o.clone());
        match outcome {
            Ok(Some(result)) => result,
            Ok(None) | Err(_) => Err(ChnlzrError::Io(
                "streaming task ended without reporting".to_string(),
            )),
        }
    }
}

/// A leased, streaming channel.
///
/// The connection stays open while the event receiver is alive and the
/// source has not been released: dropping a `SamplesSource` whose events were
/// never taken closes it.
pub struct SamplesSource {
    host: HostId,
    capabilities: Option<Capabilities>,
    state: watch::Receiver<ChannelState>,
    events: Option<mpsc::Receiver<StreamEvent>>,
    closer: SourceCloser,
}

impl SamplesSource {
    /// Builds the handle and the task body that feeds it.
    pub(crate) fn attach(
        host: HostId,
        established: Established,
        queue_size: usize,
    ) -> (SamplesSource, Streaming) {
        let (state_tx, state_rx) = watch::channel(established.state);
        let (events_tx, events_rx) = mpsc::channel(queue_size.max(1));
        let (closed_tx, closed_rx) = watch::channel(None);
        let release = CancellationToken::new();

        let source = SamplesSource {
            host: host.clone(),
            capabilities: established.capabilities,
            state: state_rx,
            events: Some(events_rx),
            closer: SourceCloser {
                release: release.clone(),
                closed: closed_rx,
            },
        };
        let streaming = Streaming {
            host,
            initial: established.state,
            state: state_tx,
            events: events_tx,
            closed: closed_tx,
            release,
        };
        (source, streaming)
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    /// `None` only for hosts using the request-first profile that never sent them.
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.capabilities.as_ref()
    }

    /// Latest channel state pushed by the host.
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Hands the event stream to its consumer. Only the first call returns it.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        self.events.take()
    }

    pub fn closer(&self) -> SourceCloser {
        self.closer.clone()
    }

    pub fn release(&self) {
        self.closer.release();
    }

    pub async fn closed(&self) -> Result<(), ChnlzrError> {
        self.closer.closed().await
    }
}

impl fmt::Debug for SamplesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SamplesSource")
            .field("host", &self.host)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Task body forwarding inbound messages of an established connection.
pub(crate) struct Streaming {
    host: HostId,
    initial: ChannelState,
    state: watch::Sender<ChannelState>,
    events: mpsc::Sender<StreamEvent>,
    closed: watch::Sender<CloseOutcome>,
    release: CancellationToken,
}

impl Streaming {
    pub(crate) async fn run<T>(self, mut connection: ChnlzrConnection<T>)
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let host = &self.host;
        let mut dropped = 0u64;

        let mut outcome = match self.events.try_send(StreamEvent::StateChanged(self.initial)) {
            Ok(()) => None,
            Err(TrySendError::Closed(_)) => Some(Ok(())),
            Err(TrySendError::Full(_)) => None,
        };

        while outcome.is_none() {
            outcome = tokio::select! {
                _ = self.release.cancelled() => {
                    debug!("{} source released", host);
                    Some(Ok(()))
                }
                _ = self.events.closed() => {
                    debug!("{} source consumer went away", host);
                    Some(Ok(()))
                }
                message = connection.recv() => match message {
                    None => {
                        warn!("{} closed the connection", host);
                        Some(Ok(()))
                    }
                    Some(Err(err)) => Some(Err(err.into())),
                    Some(Ok(Message::ChannelState(state))) => {
                        info!("{} retuned to {:?}", host, state);
                        self.state.send_replace(state);
                        // a stalled consumer must not hold off a release
                        tokio::select! {
                            sent = self.events.send(StreamEvent::StateChanged(state)) => match sent {
                                Ok(()) => None,
                                Err(_) => Some(Ok(())),
                            },
                            _ = self.release.cancelled() => {
                                debug!("{} source released while delivering a retune", host);
                                Some(Ok(()))
                            }
                        }
                    }
                    Some(Ok(Message::Samples(payload))) => {
                        let samples: Arc<[Complex]> = Complex::from_interleaved(payload).into();
                        match self.events.try_send(StreamEvent::Samples(samples)) {
                            Ok(()) => None,
                            Err(TrySendError::Full(_)) => {
                                dropped += 1;
                                trace!("{} consumer lagging, {} sample blocks dropped", host, dropped);
                                None
                            }
                            Err(TrySendError::Closed(_)) => Some(Ok(())),
                        }
                    }
                    Some(Ok(Message::Error(code))) => {
                        warn!("{} closed the channel with error {}", host, code);
                        Some(Err(ChnlzrError::Protocol { code }))
                    }
                    Some(Ok(Message::Heartbeat)) => None,
                    Some(Ok(other)) => Some(Err(ChnlzrError::UnexpectedMessage {
                        phase: Phase::Streaming,
                        observed: other.kind(),
                    })),
                },
            };
        }

        connection.close().await;
        if dropped > 0 {
            debug!("{} dropped {} sample blocks over the lease", host, dropped);
        }
        self.closed.send_replace(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ChnlzrCodec, ErrorCode};
    use bytes::{BufMut, BytesMut};
    use futures::{SinkExt, StreamExt};
    use std::time::Duration;
    use tokio_util::codec::Framed;

    fn state(center_frequency: f64) -> ChannelState {
        ChannelState {
            sample_rate: 48_000,
            center_frequency,
        }
    }

    fn start(queue_size: usize) -> (SamplesSource, Framed<tokio::io::DuplexStream, ChnlzrCodec>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let established = Established {
            capabilities: None,
            state: state(100.0),
        };
        let (source, streaming) =
            SamplesSource::attach(HostId::new("localhost", 7070), established, queue_size);
        tokio::spawn(streaming.run(ChnlzrConnection::new(client, Duration::from_secs(30))));
        (source, Framed::new(server, ChnlzrCodec))
    }

    fn samples_payload(pairs: &[(f32, f32)]) -> Bytes {
        let mut buf = BytesMut::new();
        for (re, im) in pairs {
            buf.put_f32(*re);
            buf.put_f32(*im);
        }
        buf.freeze()
    }

    #[test]
    fn test_interleaved_samples() {
        let samples = Complex::from_interleaved(samples_payload(&[(1.0, -1.0), (0.5, 0.25)]));
        assert_eq!(
            samples,
            vec![Complex { re: 1.0, im: -1.0 }, Complex { re: 0.5, im: 0.25 }]
        );
    }

    #[tokio::test]
    async fn test_forwards_state_and_samples() {
        let (mut source, mut host) = start(8);
        let mut events = source.take_events().unwrap();

        match events.recv().await.unwrap() {
            StreamEvent::StateChanged(s) => assert_eq!(s, state(100.0)),
            other => panic!("unexpected {:?}", other),
        }

        host.send(Message::Samples(samples_payload(&[(1.0, 2.0)]))).await.unwrap();
        host.send(Message::ChannelState(state(200.0))).await.unwrap();

        match events.recv().await.unwrap() {
            StreamEvent::Samples(samples) => assert_eq!(samples[0], Complex { re: 1.0, im: 2.0 }),
            other => panic!("unexpected {:?}", other),
        }
        match events.recv().await.unwrap() {
            StreamEvent::StateChanged(s) => assert_eq!(s, state(200.0)),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(source.state(), state(200.0));
    }

    #[tokio::test]
    async fn test_host_error_completes_with_code() {
        let (mut source, mut host) = start(8);
        let _events = source.take_events().unwrap();

        host.send(Message::Error(ErrorCode::PROCESSING_UNAVAILABLE)).await.unwrap();

        assert_eq!(
            source.closed().await,
            Err(ChnlzrError::Protocol {
                code: ErrorCode::PROCESSING_UNAVAILABLE
            })
        );
        assert!(host.next().await.is_none());
    }

    #[tokio::test]
    async fn test_release_closes_connection() {
        let (mut source, mut host) = start(8);
        let _events = source.take_events().unwrap();
        let closer = source.closer();

        closer.release();
        closer.release();

        assert_eq!(source.closed().await, Ok(()));
        assert!(closer.is_closed());
        assert!(host.next().await.is_none());
    }

    #[tokio::test]
    async fn test_release_while_consumer_stalled_on_retune() {
        let (mut source, mut host) = start(1);
        // initial state fills the queue and is never read
        let _events = source.take_events().unwrap();

        host.send(Message::ChannelState(state(200.0))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.state(), state(200.0));

        source.release();

        let closed = tokio::time::timeout(Duration::from_secs(5), source.closed()).await;
        assert_eq!(closed.unwrap(), Ok(()));
        assert!(host.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_untaken_source_closes_connection() {
        let (source, mut host) = start(8);
        drop(source);

        assert!(host.next().await.is_none());
    }
}
