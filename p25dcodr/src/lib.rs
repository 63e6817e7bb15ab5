//! # p25dcodr
//!
//! Decoder side of the service: leases channels through a
//! [`p25chnlzr::SourceController`], decodes them in a bounded [`DspPool`] and
//! exposes the HTTP resources that drive it.
//!
//! - [`decoder`] : boundary with the P25 protocol layer
//! - [`sinks`] : what is done with decoded data units (qualify, follow, capture)
//! - [`dsp`] : pipelines and the pool bounding them
//! - [`resources`] : `/qualify` and `/channels/*` handlers, see [`resources::router`]

pub mod config_ext;
pub mod decoder;
pub mod dsp;
pub mod resources;
pub mod sinks;

pub use config_ext::{DcodrConfigExt, DcodrSettings};
pub use decoder::{DataUnit, DataUnitDecoder, DecoderFactory, SampleBlockDecoder, SharedDecoderFactory, SiteStatus};
pub use dsp::{DspPool, PipelineEnd, PipelineExit, PipelineHandle};
pub use resources::{DcodrApiDoc, DcodrState, ResourceError, router};
pub use sinks::{ControlChannelFollower, ControlChannelQualifier, DataUnitSink, GroupTrafficCapture, SinkFlow};
