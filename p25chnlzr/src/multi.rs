use crate::codec::{ChannelRequest, ErrorCode};
use crate::error::ChnlzrError;
use crate::host::{HostController, LinkSettings, SourceController};
use crate::negotiation::NegotiationProfile;
use crate::source::SamplesSource;
use async_trait::async_trait;
use p25model::HostId;
use std::sync::Arc;
use tracing::debug;

/// Tries a fixed list of hosts in order until one grants the channel.
pub struct MultiHostController {
    hosts: Vec<Arc<dyn SourceController>>,
}

impl MultiHostController {
    pub fn new(hosts: Vec<Arc<dyn SourceController>>) -> Self {
        Self { hosts }
    }

    /// One [`HostController`] per `(host, profile)` entry, in the given order.
    pub fn from_hosts(
        hosts: impl IntoIterator<Item = (HostId, NegotiationProfile, LinkSettings)>,
    ) -> Self {
        let hosts = hosts
            .into_iter()
            .map(|(host, profile, settings)| {
                Arc::new(HostController::new(host, profile, settings)) as Arc<dyn SourceController>
            })
            .collect();
        Self::new(hosts)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[async_trait]
impl SourceController for MultiHostController {
    async fn acquire(&self, request: &ChannelRequest) -> Result<SamplesSource, ChnlzrError> {
        for host in &self.hosts {
            match host.acquire(request).await {
                Ok(source) => return Ok(source),
                Err(err) => debug!("{} rejected channel request: {}", host.describe(), err),
            }
        }

        Err(ChnlzrError::Protocol {
            code: ErrorCode::BANDWIDTH_UNAVAILABLE,
        })
    }

    fn describe(&self) -> String {
        let hosts: Vec<String> = self.hosts.iter().map(|h| h.describe()).collect();
        format!("[{}]", hosts.join(", "))
    }
}
