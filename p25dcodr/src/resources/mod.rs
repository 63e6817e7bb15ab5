//! HTTP resources of the decoder service.
//!
//! | Route | |
//! |---|---|
//! | `POST /qualify` | identify the control channel on a frequency |
//! | `GET /channels` | every monitored channel |
//! | `GET/POST/DELETE /channels/control` | followed control channels |
//! | `POST /channels/traffic/group` | capture a group call |

mod channels;
mod error;
mod lease;
mod qualify;

pub use channels::{
    capture_group_traffic, follow_control_channel, list_channels, list_control_channels,
    unfollow_control_channel,
};
pub use error::{ErrorBody, ResourceError};
pub use qualify::qualify;

use crate::config_ext::DcodrSettings;
use crate::decoder::{SampleBlockDecoder, SharedDecoderFactory};
use crate::dsp::DspPool;
use axum::Router;
use axum::routing::{get, post};
use lease::PendingRequests;
use p25chnlzr::SourceController;
use p25monitor::endpoints::{CONTROL_CHANNELS_PATH, GROUP_TRAFFIC_PATH, QUALIFY_PATH};
use p25monitor::{ChannelRegistry, TrafficCaptureEndpoint};
use std::sync::Arc;
use utoipa::OpenApi;

/// Everything the handlers share.
#[derive(Clone)]
pub struct DcodrState {
    pub settings: DcodrSettings,
    pub chnlzr: Arc<dyn SourceController>,
    pub registry: Arc<dyn ChannelRegistry>,
    pub traffic: Arc<dyn TrafficCaptureEndpoint>,
    pub dsp: DspPool,
    pub decoders: SharedDecoderFactory,
    pending: PendingRequests,
}

impl DcodrState {
    pub fn new(
        settings: DcodrSettings,
        chnlzr: Arc<dyn SourceController>,
        registry: Arc<dyn ChannelRegistry>,
        traffic: Arc<dyn TrafficCaptureEndpoint>,
    ) -> Self {
        let dsp = DspPool::new(settings.dsp_pool_size);
        Self {
            settings,
            chnlzr,
            registry,
            traffic,
            dsp,
            decoders: SampleBlockDecoder::factory(),
            pending: PendingRequests::default(),
        }
    }

    pub fn with_decoders(mut self, decoders: SharedDecoderFactory) -> Self {
        self.decoders = decoders;
        self
    }
}

pub fn router(state: DcodrState) -> Router {
    Router::new()
        .route(QUALIFY_PATH, post(qualify))
        .route("/channels", get(list_channels))
        .route(
            CONTROL_CHANNELS_PATH,
            get(list_control_channels)
                .post(follow_control_channel)
                .delete(unfollow_control_channel),
        )
        .route(GROUP_TRAFFIC_PATH, post(capture_group_traffic))
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        qualify::qualify,
        channels::list_channels,
        channels::list_control_channels,
        channels::follow_control_channel,
        channels::unfollow_control_channel,
        channels::capture_group_traffic,
    ),
    components(
        schemas(
            p25model::RfAttributes,
            p25model::FollowRequest,
            p25model::GroupCaptureRequest,
            p25model::ControlChannelId,
            p25model::GroupChannelId,
            p25model::ChannelReference,
            p25model::ControlChannelQualities,
            ErrorBody,
        )
    ),
    tags(
        (name = "dcodr", description = "P25 control channel qualification, following and traffic capture")
    ),
    info(
        title = "P25Dcodr API",
        version = "0.1.0",
    )
)]
pub struct DcodrApiDoc;
