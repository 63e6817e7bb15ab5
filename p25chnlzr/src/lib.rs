//! # p25chnlzr - client of the channelizer protocol
//!
//! Leases narrowband sample streams from remote channelizer hosts.
//!
//! - [`codec`] : framing of the binary protocol
//! - [`negotiation`] : handshake state machine (`Connecting` → `Streaming`)
//! - [`HostController`] : one host, one fresh connection per acquisition
//! - [`MultiHostController`] : ordered fallback over several hosts
//! - [`SamplesSource`] : the streaming handle handed to the caller
//!
//! ```rust,ignore
//! use p25chnlzr::{ChannelRequest, SourceController};
//!
//! let controller = get_config().get_chnlzr_settings()?.controller();
//! let mut source = controller.acquire_within(&ChannelRequest::p25(&rf, 2000), timeout).await?;
//! let events = source.take_events();
//! ```

pub mod codec;
mod config_ext;
mod connection;
mod error;
mod host;
mod multi;
pub mod negotiation;
mod request;
mod resolve;
mod source;

pub use codec::{Capabilities, ChannelRequest, ChannelState, ChnlzrCodec, ErrorCode, Message, MessageKind};
pub use config_ext::{ChnlzrConfigExt, ChnlzrSettings, HostConfig};
pub use connection::ChnlzrConnection;
pub use error::ChnlzrError;
pub use host::{HostController, LinkSettings, SourceController};
pub use multi::MultiHostController;
pub use negotiation::{NegotiationProfile, Negotiator, Phase};
pub use request::{P25_CHANNEL_WIDTH, P25_SAMPLE_RATE};
pub use source::{Complex, SamplesSource, SourceCloser, StreamEvent};
