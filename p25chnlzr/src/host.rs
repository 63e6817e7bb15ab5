use crate::codec::ChannelRequest;
use crate::error::ChnlzrError;
use crate::negotiation::{Negotiated, NegotiationProfile, Negotiator};
use crate::resolve::{Resolver, resolve_once};
use crate::source::SamplesSource;
use async_trait::async_trait;
use p25model::HostId;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Connection parameters shared by every host.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub connection_timeout: Duration,
    pub idle_state_threshold: Duration,
    pub events_queue_size: usize,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(5),
            idle_state_threshold: Duration::from_secs(15),
            events_queue_size: 64,
        }
    }
}

/// Anything able to lease a streaming channel.
#[async_trait]
pub trait SourceController: Send + Sync {
    /// Opens a new lease for `request`. Dropping the returned future cancels
    /// the acquisition and closes the partially negotiated connection.
    async fn acquire(&self, request: &ChannelRequest) -> Result<SamplesSource, ChnlzrError>;

    /// Name used in logs.
    fn describe(&self) -> String;

    /// [`SourceController::acquire`] bounded by `limit`.
    async fn acquire_within(
        &self,
        request: &ChannelRequest,
        limit: Duration,
    ) -> Result<SamplesSource, ChnlzrError> {
        match timeout(limit, self.acquire(request)).await {
            Ok(result) => result,
            Err(_) => Err(ChnlzrError::Timeout(limit)),
        }
    }
}

/// Leases channels from a single host, one fresh connection per acquisition.
#[derive(Debug, Clone)]
pub struct HostController {
    host: HostId,
    profile: NegotiationProfile,
    settings: LinkSettings,
}

impl HostController {
    pub fn new(host: HostId, profile: NegotiationProfile, settings: LinkSettings) -> Self {
        Self {
            host,
            profile,
            settings,
        }
    }

    pub fn host(&self) -> &HostId {
        &self.host
    }

    async fn connect(&self) -> Result<TcpStream, ChnlzrError> {
        let address = self.host.address();
        match timeout(self.settings.connection_timeout, TcpStream::connect(&address)).await {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(err)) => Err(ChnlzrError::connect_failed(&self.host, err)),
            Err(_) => Err(ChnlzrError::connect_failed(
                &self.host,
                format!("no answer within {:?}", self.settings.connection_timeout),
            )),
        }
    }

    async fn negotiate(
        &self,
        request: ChannelRequest,
    ) -> Result<Negotiated<TcpStream>, ChnlzrError> {
        let stream = self.connect().await?;
        Negotiator::new(
            self.host.to_string(),
            self.profile,
            request,
            self.settings.idle_state_threshold,
        )
        .negotiate(stream)
        .await
    }

    /// Connection task: handshake, hand the source over, then stream.
    async fn run(
        self,
        request: ChannelRequest,
        mut resolver: Resolver<Result<SamplesSource, ChnlzrError>>,
    ) {
        let negotiated = tokio::select! {
            negotiated = self.negotiate(request) => negotiated,
            _ = resolver.abandoned() => {
                debug!("{} acquisition cancelled during handshake", self.host);
                return;
            }
        };

        match negotiated {
            Err(err) => {
                let _ = resolver.resolve(Err(err));
            }
            Ok(Negotiated {
                connection,
                established,
            }) => {
                let (source, streaming) = SamplesSource::attach(
                    self.host.clone(),
                    established,
                    self.settings.events_queue_size,
                );
                if resolver.resolve(Ok(source)).is_err() {
                    debug!("{} acquisition abandoned after handshake", self.host);
                    connection.close().await;
                    return;
                }
                streaming.run(connection).await;
            }
        }
    }
}

#[async_trait]
impl SourceController for HostController {
    async fn acquire(&self, request: &ChannelRequest) -> Result<SamplesSource, ChnlzrError> {
        let (resolver, resolved) = resolve_once();
        tokio::spawn(self.clone().run(*request, resolver));

        resolved.await.unwrap_or_else(|_| {
            Err(ChnlzrError::Io(format!(
                "{} connection task ended without a result",
                self.host
            )))
        })
    }

    fn describe(&self) -> String {
        self.host.to_string()
    }
}
