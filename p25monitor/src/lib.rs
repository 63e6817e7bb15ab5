//! # p25monitor
//!
//! Keeps channel leases alive only while they produce data units.
//!
//! - [`ActivityCounter`] : per-lease liveness signal fed by the decoder
//! - [`ChannelMonitor`] : at most one lease per [`p25model::ChannelId`], periodic inactivity sweeps
//! - [`RetryingControlChannelMonitor`] : re-qualifies inactive control channels before forgetting them
//! - [`endpoints`] : HTTP clients for the qualify, follow and traffic-capture endpoints
//!
//! ```no_run
//! use p25monitor::{ActivityCounter, ChannelMonitor, ChannelRegistry, MonitorSettings};
//! use p25model::{ControlChannelId, FollowRequest, RfAttributes};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let monitor = ChannelMonitor::new(MonitorSettings::default());
//! let request = FollowRequest::new(
//!     RfAttributes::new(40.0, -75.0, 0, 851_012_500.0),
//!     ControlChannelId::new(0xBEE00, 0x1A2, 1, 1),
//! );
//! let activity = ActivityCounter::new();
//! let accepted = monitor.register(request.into(), Box::new(CancellationToken::new()), activity.clone());
//! assert!(accepted);
//! activity.increment();
//! # }
//! ```

mod activity;
pub mod config_ext;
pub mod endpoints;
mod monitor;
mod retrying;
mod task;

pub use activity::ActivityCounter;
pub use config_ext::{MonitorConfigExt, MonitorSettings};
pub use endpoints::{
    EndpointError, FollowEndpoint, HttpEndpoints, QualifyEndpoint, TrafficCaptureEndpoint,
};
pub use monitor::{ChannelMonitor, ChannelRegistry};
pub use retrying::{QualifyStage, RetryingControlChannelMonitor};
pub use task::LeaseTask;
