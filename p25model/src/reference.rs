use crate::{ChannelId, FollowRequest, GroupCaptureRequest};
use serde::Serialize;
use utoipa::ToSchema;

/// Anything that names the channel it is about.
pub trait Identifiable {
    fn channel_id(&self) -> ChannelId;
}

impl Identifiable for FollowRequest {
    fn channel_id(&self) -> ChannelId {
        ChannelId::Control(self.channel_id)
    }
}

impl Identifiable for GroupCaptureRequest {
    fn channel_id(&self) -> ChannelId {
        ChannelId::TrafficGroup(self.channel_id)
    }
}

/// Descriptor of a monitored channel: the request that opened the lease.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelReference {
    Follow(FollowRequest),
    GroupCapture(GroupCaptureRequest),
}

impl ChannelReference {
    pub fn as_follow(&self) -> Option<&FollowRequest> {
        match self {
            ChannelReference::Follow(request) => Some(request),
            ChannelReference::GroupCapture(_) => None,
        }
    }
}

impl Identifiable for ChannelReference {
    fn channel_id(&self) -> ChannelId {
        match self {
            ChannelReference::Follow(request) => request.channel_id(),
            ChannelReference::GroupCapture(request) => request.channel_id(),
        }
    }
}

impl From<FollowRequest> for ChannelReference {
    fn from(request: FollowRequest) -> Self {
        ChannelReference::Follow(request)
    }
}

impl From<GroupCaptureRequest> for ChannelReference {
    fn from(request: GroupCaptureRequest) -> Self {
        ChannelReference::GroupCapture(request)
    }
}
