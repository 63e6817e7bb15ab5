//! # p25model
//!
//! Types shared between the channelizer client, the channel monitor and the
//! HTTP resources:
//!
//! - [`ChannelId`] : logical key under which a lease is registered
//! - [`HostId`] : address of one channelizer host
//! - [`RfAttributes`], [`QualifyRequest`], [`FollowRequest`], [`GroupCaptureRequest`] : request bodies
//! - [`ControlChannelQualities`] : what a qualification probe learned about a control channel
//! - [`ChannelReference`] : descriptor of a monitored channel, as listed by the registry

mod channel_id;
mod error;
mod host;
mod qualities;
mod reference;
mod request;

pub use channel_id::{
    ChannelId, ChannelKind, ControlChannelId, DirectChannelId, GroupChannelId, QualifyChannelId,
    UNIT_ID_NONE,
};
pub use error::ValidationError;
pub use host::HostId;
pub use qualities::ControlChannelQualities;
pub use reference::{ChannelReference, Identifiable};
pub use request::{FollowRequest, GroupCaptureRequest, QualifyRequest, RfAttributes};
