//! Consumers of decoded data units, one per kind of lease.

use crate::decoder::{DataUnit, SiteStatus};
use p25model::{ControlChannelQualities, FollowRequest, GroupCaptureRequest, GroupChannelId, Identifiable, RfAttributes};
use p25monitor::TrafficCaptureEndpoint;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the pipeline does after handing a unit to its sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    /// The sink is done with the channel; the pipeline ends.
    Stop,
}

pub trait DataUnitSink: Send + 'static {
    fn consume(&mut self, unit: &DataUnit) -> SinkFlow;
}

/// Accumulates what a control channel says about itself.
#[derive(Debug, Default)]
pub struct ControlChannelQualifier {
    status: Option<SiteStatus>,
    data_unit_count: u64,
}

impl ControlChannelQualifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` until a site status carrying its downlink frequency was seen.
    pub fn qualities(&self) -> Option<ControlChannelQualities> {
        let status = self.status.as_ref()?;
        Some(ControlChannelQualities {
            wacn: status.wacn,
            system_id: status.system_id,
            local_reg_area: status.local_reg_area,
            rf_subsystem_id: status.rf_subsystem_id,
            site_id: status.site_id,
            manufacturer_id: status.manufacturer_id,
            fss_connected: status.fss_connected,
            system_services: status.system_services,
            frequency: status.frequency?,
            data_unit_count: self.data_unit_count,
        })
    }
}

impl DataUnitSink for ControlChannelQualifier {
    fn consume(&mut self, unit: &DataUnit) -> SinkFlow {
        self.data_unit_count += 1;
        if let DataUnit::SiteStatus(status) = unit {
            let frequency = status.frequency.or(self.status.as_ref().and_then(|s| s.frequency));
            self.status = Some(SiteStatus {
                frequency,
                ..status.clone()
            });
        }
        SinkFlow::Continue
    }
}

/// Follows a control channel: every group voice grant becomes a traffic
/// capture request, posted without waiting for the answer.
pub struct ControlChannelFollower {
    request: FollowRequest,
    traffic: Arc<dyn TrafficCaptureEndpoint>,
}

impl ControlChannelFollower {
    pub fn new(request: FollowRequest, traffic: Arc<dyn TrafficCaptureEndpoint>) -> Self {
        Self { request, traffic }
    }

    fn capture_request(&self, source_id: i32, group_id: i32, frequency: f64) -> GroupCaptureRequest {
        let control = self.request.channel_id;
        GroupCaptureRequest::new(
            RfAttributes {
                frequency,
                ..self.request.rf
            },
            GroupChannelId::new(
                control.wacn,
                control.system_id,
                control.rf_subsystem_id,
                source_id,
                group_id,
                frequency,
            ),
        )
    }
}

impl DataUnitSink for ControlChannelFollower {
    fn consume(&mut self, unit: &DataUnit) -> SinkFlow {
        if let DataUnit::GroupVoiceGrant {
            source_id,
            group_id,
            frequency,
        } = unit
        {
            let capture = self.capture_request(*source_id, *group_id, *frequency);
            debug!("{} grant, capturing {}", self.request.channel_id(), capture.channel_id());

            let traffic = self.traffic.clone();
            tokio::spawn(async move {
                if let Err(err) = traffic.capture_group(&capture).await {
                    warn!("post to traffic target failed for {}: {}", capture.channel_id(), err);
                }
            });
        }
        SinkFlow::Continue
    }
}

/// Captures one group call until its terminator.
#[derive(Debug)]
pub struct GroupTrafficCapture {
    request: GroupCaptureRequest,
}

impl GroupTrafficCapture {
    pub fn new(request: GroupCaptureRequest) -> Self {
        Self { request }
    }
}

impl DataUnitSink for GroupTrafficCapture {
    fn consume(&mut self, unit: &DataUnit) -> SinkFlow {
        match unit {
            DataUnit::Terminator => {
                debug!("{} call terminated", self.request.channel_id());
                SinkFlow::Stop
            }
            _ => SinkFlow::Continue,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use p25model::{ControlChannelId, UNIT_ID_NONE};
    use p25monitor::endpoints::Result;
    use tokio::sync::mpsc;

    pub(crate) fn site_status(frequency: Option<f64>) -> SiteStatus {
        SiteStatus {
            wacn: 0xBEE00,
            system_id: 0x1A2,
            local_reg_area: 0,
            rf_subsystem_id: 1,
            site_id: 3,
            manufacturer_id: 0,
            fss_connected: true,
            system_services: 0,
            frequency,
        }
    }

    /// Traffic endpoint forwarding every request to a channel.
    pub(crate) struct ChannelTraffic(pub(crate) mpsc::UnboundedSender<GroupCaptureRequest>);

    #[async_trait]
    impl TrafficCaptureEndpoint for ChannelTraffic {
        async fn capture_group(&self, request: &GroupCaptureRequest) -> Result<()> {
            let _ = self.0.send(request.clone());
            Ok(())
        }
    }

    #[test]
    fn test_qualifier_needs_frequency() {
        let mut qualifier = ControlChannelQualifier::new();
        assert!(qualifier.qualities().is_none());

        qualifier.consume(&DataUnit::SiteStatus(site_status(None)));
        qualifier.consume(&DataUnit::Other);
        assert!(qualifier.qualities().is_none());

        qualifier.consume(&DataUnit::SiteStatus(site_status(Some(851_012_500.0))));
        qualifier.consume(&DataUnit::SiteStatus(site_status(None)));

        let qualities = qualifier.qualities().unwrap();
        assert_eq!(qualities.control_channel_id(), ControlChannelId::new(0xBEE00, 0x1A2, 1, 3));
        assert_eq!(qualities.frequency, 851_012_500.0);
        assert_eq!(qualities.data_unit_count, 4);
    }

    #[tokio::test]
    async fn test_follower_posts_grants() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let request = FollowRequest::new(
            RfAttributes::new(40.0, -75.0, 0, 851_012_500.0),
            ControlChannelId::new(0xBEE00, 0x1A2, 1, 3),
        );
        let mut follower = ControlChannelFollower::new(request, Arc::new(ChannelTraffic(tx)));

        follower.consume(&DataUnit::Other);
        follower.consume(&DataUnit::GroupVoiceGrant {
            source_id: UNIT_ID_NONE,
            group_id: 7,
            frequency: 852_000_000.0,
        });

        let capture = rx.recv().await.unwrap();
        assert_eq!(capture.rf.frequency, 852_000_000.0);
        assert_eq!(capture.rf.latitude, 40.0);
        assert_eq!(
            capture.channel_id(),
            GroupChannelId::new(0xBEE00, 0x1A2, 1, 1001, 7, 852_000_000.0).into()
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_capture_stops_on_terminator() {
        let mut capture = GroupTrafficCapture::new(GroupCaptureRequest::new(
            RfAttributes::new(40.0, -75.0, 0, 852_000_000.0),
            GroupChannelId::new(0xBEE00, 0x1A2, 1, 1001, 7, 852_000_000.0),
        ));

        assert_eq!(capture.consume(&DataUnit::Other), SinkFlow::Continue);
        assert_eq!(capture.consume(&DataUnit::Terminator), SinkFlow::Stop);
    }
}
