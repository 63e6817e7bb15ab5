//! Handshake that turns a fresh connection into a streaming channel lease.
//!
//! ```text
//! Connecting -> AwaitingCapabilities -> AwaitingChannelState -> Streaming
//!      \                 \                       \
//!       `-----------------`-----------------------`--> Closed
//! ```
//!
//! [`Negotiation`] holds the phase and decides, one message at a time, what
//! the connection must do next. [`Negotiator`] runs it over a transport.

use crate::codec::{Capabilities, ChannelRequest, ChannelState, Message};
use crate::connection::ChnlzrConnection;
use crate::error::ChnlzrError;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    AwaitingCapabilities,
    AwaitingChannelState,
    Streaming,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connecting => "connecting",
            Phase::AwaitingCapabilities => "awaiting capabilities",
            Phase::AwaitingChannelState => "awaiting channel state",
            Phase::Streaming => "streaming",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Handshake variant spoken by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationProfile {
    /// Wait for the host's Capabilities before sending the channel request.
    #[default]
    CapabilitiesFirst,
    /// Send the channel request as soon as the connection is up; Capabilities
    /// are optional and cached if they arrive before the ChannelState.
    RequestFirst,
}

/// What the connection has to do after a handshake event.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Wait,
    SendRequest,
    Established(Established),
}

/// Result of a successful handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct Established {
    pub capabilities: Option<Capabilities>,
    pub state: ChannelState,
}

/// Handshake state of one connection.
#[derive(Debug)]
pub struct Negotiation {
    profile: NegotiationProfile,
    phase: Phase,
    capabilities: Option<Capabilities>,
}

impl Negotiation {
    pub fn new(profile: NegotiationProfile) -> Self {
        Self {
            profile,
            phase: Phase::Connecting,
            capabilities: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The transport is up.
    pub fn on_connected(&mut self) -> Step {
        if self.phase != Phase::Connecting {
            return Step::Wait;
        }
        match self.profile {
            NegotiationProfile::CapabilitiesFirst => {
                self.phase = Phase::AwaitingCapabilities;
                Step::Wait
            }
            NegotiationProfile::RequestFirst => {
                self.phase = Phase::AwaitingChannelState;
                Step::SendRequest
            }
        }
    }

    /// Applies one inbound message. Any error leaves the negotiation `Closed`.
    pub fn on_message(&mut self, message: &Message) -> Result<Step, ChnlzrError> {
        let phase = self.phase;
        let handshaking = matches!(
            phase,
            Phase::AwaitingCapabilities | Phase::AwaitingChannelState
        );
        if !handshaking {
            self.phase = Phase::Closed;
            return Err(ChnlzrError::UnexpectedMessage {
                phase,
                observed: message.kind(),
            });
        }

        match (phase, message) {
            (_, Message::Heartbeat) => Ok(Step::Wait),
            (_, Message::Error(code)) => {
                self.phase = Phase::Closed;
                Err(ChnlzrError::Protocol { code: *code })
            }
            (Phase::AwaitingCapabilities, Message::Capabilities(capabilities)) => {
                self.capabilities = Some(*capabilities);
                self.phase = Phase::AwaitingChannelState;
                Ok(Step::SendRequest)
            }
            (Phase::AwaitingChannelState, Message::Capabilities(capabilities))
                if self.profile == NegotiationProfile::RequestFirst
                    && self.capabilities.is_none() =>
            {
                self.capabilities = Some(*capabilities);
                Ok(Step::Wait)
            }
            (Phase::AwaitingChannelState, Message::ChannelState(state)) => {
                self.phase = Phase::Streaming;
                Ok(Step::Established(Established {
                    capabilities: self.capabilities.take(),
                    state: *state,
                }))
            }
            (phase, other) => {
                self.phase = Phase::Closed;
                Err(ChnlzrError::UnexpectedMessage {
                    phase,
                    observed: other.kind(),
                })
            }
        }
    }

    /// The host went away before the handshake completed.
    pub fn on_closed(&mut self, host: &str) -> ChnlzrError {
        let phase = self.phase;
        self.phase = Phase::Closed;
        ChnlzrError::connect_failed(host, format!("connection closed while {}", phase))
    }
}

/// A connection that completed its handshake.
pub struct Negotiated<T> {
    pub connection: ChnlzrConnection<T>,
    pub established: Established,
}

/// Drives a [`Negotiation`] over one transport.
#[derive(Debug, Clone)]
pub struct Negotiator {
    host: String,
    profile: NegotiationProfile,
    request: ChannelRequest,
    idle_threshold: Duration,
}

impl Negotiator {
    pub fn new(
        host: impl Into<String>,
        profile: NegotiationProfile,
        request: ChannelRequest,
        idle_threshold: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            profile,
            request,
            idle_threshold,
        }
    }

    /// Runs the handshake. On failure the connection has been closed.
    pub async fn negotiate<T>(self, transport: T) -> Result<Negotiated<T>, ChnlzrError>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut connection = ChnlzrConnection::new(transport, self.idle_threshold);
        let mut negotiation = Negotiation::new(self.profile);

        let mut step = Ok(negotiation.on_connected());
        loop {
            match step {
                Ok(Step::Wait) => {}
                Ok(Step::SendRequest) => {
                    debug!("{} sending channel request", self.host);
                    if let Err(err) = connection
                        .send(Message::ChannelRequest(self.request))
                        .await
                    {
                        connection.close().await;
                        return Err(err.into());
                    }
                }
                Ok(Step::Established(established)) => {
                    debug!("{} channel established: {:?}", self.host, established.state);
                    return Ok(Negotiated {
                        connection,
                        established,
                    });
                }
                Err(err) => {
                    warn!("{} handshake failed: {}", self.host, err);
                    connection.close().await;
                    return Err(err);
                }
            }

            step = match connection.recv().await {
                Some(Ok(message)) => negotiation.on_message(&message),
                Some(Err(err)) => Err(err.into()),
                None => Err(negotiation.on_closed(&self.host)),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{ErrorCode, MessageKind};

    fn capabilities() -> Capabilities {
        Capabilities {
            latitude: 10.0,
            longitude: 20.0,
            polarization: 0,
            min_frequency: 30.0,
            max_frequency: 40.0,
            max_channel_rate: 50,
        }
    }

    fn state() -> ChannelState {
        ChannelState {
            sample_rate: 48_000,
            center_frequency: 851_012_500.0,
        }
    }

    #[test]
    fn test_capabilities_first_happy_path() {
        let mut negotiation = Negotiation::new(NegotiationProfile::CapabilitiesFirst);

        assert_eq!(negotiation.on_connected(), Step::Wait);
        assert_eq!(negotiation.phase(), Phase::AwaitingCapabilities);
        assert_eq!(
            negotiation.on_message(&Message::Capabilities(capabilities())).unwrap(),
            Step::SendRequest
        );
        assert_eq!(
            negotiation.on_message(&Message::ChannelState(state())).unwrap(),
            Step::Established(Established {
                capabilities: Some(capabilities()),
                state: state(),
            })
        );
        assert_eq!(negotiation.phase(), Phase::Streaming);
    }

    #[test]
    fn test_success_exit_is_reached_once() {
        let mut negotiation = Negotiation::new(NegotiationProfile::RequestFirst);
        negotiation.on_connected();
        negotiation.on_message(&Message::ChannelState(state())).unwrap();

        let second = negotiation.on_message(&Message::ChannelState(state()));
        assert_eq!(
            second,
            Err(ChnlzrError::UnexpectedMessage {
                phase: Phase::Streaming,
                observed: MessageKind::ChannelState,
            })
        );
        assert_eq!(negotiation.phase(), Phase::Closed);
    }

    #[test]
    fn test_channel_state_before_capabilities_is_rejected() {
        let mut negotiation = Negotiation::new(NegotiationProfile::CapabilitiesFirst);
        negotiation.on_connected();

        assert_eq!(
            negotiation.on_message(&Message::ChannelState(state())),
            Err(ChnlzrError::UnexpectedMessage {
                phase: Phase::AwaitingCapabilities,
                observed: MessageKind::ChannelState,
            })
        );
        assert_eq!(negotiation.phase(), Phase::Closed);
    }

    #[test]
    fn test_request_first_caches_late_capabilities() {
        let mut negotiation = Negotiation::new(NegotiationProfile::RequestFirst);

        assert_eq!(negotiation.on_connected(), Step::SendRequest);
        assert_eq!(
            negotiation.on_message(&Message::Capabilities(capabilities())).unwrap(),
            Step::Wait
        );
        match negotiation.on_message(&Message::ChannelState(state())).unwrap() {
            Step::Established(established) => {
                assert_eq!(established.capabilities, Some(capabilities()))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_and_heartbeat() {
        let mut negotiation = Negotiation::new(NegotiationProfile::CapabilitiesFirst);
        negotiation.on_connected();

        assert_eq!(negotiation.on_message(&Message::Heartbeat).unwrap(), Step::Wait);
        assert_eq!(
            negotiation.on_message(&Message::Error(ErrorCode::INCAPABLE)),
            Err(ChnlzrError::Protocol {
                code: ErrorCode::INCAPABLE
            })
        );
    }

    #[test]
    fn test_connection_loss() {
        let mut negotiation = Negotiation::new(NegotiationProfile::CapabilitiesFirst);
        negotiation.on_connected();

        let err = negotiation.on_closed("chnlzr://localhost:7070");
        assert!(matches!(err, ChnlzrError::ConnectFailed { .. }));
        assert_eq!(negotiation.phase(), Phase::Closed);
    }
}
