use super::lease::monitor;
use super::{DcodrState, ResourceError};
use crate::sinks::{ControlChannelFollower, GroupTrafficCapture};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use p25model::{ChannelId, ChannelReference, ControlChannelId, FollowRequest, GroupCaptureRequest};
use tracing::info;

/// Every monitored channel.
#[utoipa::path(
    get,
    path = "/channels",
    tag = "dcodr",
    responses(
        (status = 200, description = "Monitored channels", body = Vec<p25model::ChannelReference>),
    )
)]
pub async fn list_channels(State(state): State<DcodrState>) -> Json<Vec<ChannelReference>> {
    Json(state.registry.list())
}

/// Followed control channels.
#[utoipa::path(
    get,
    path = "/channels/control",
    tag = "dcodr",
    responses(
        (status = 200, description = "Followed control channels", body = Vec<p25model::FollowRequest>),
    )
)]
pub async fn list_control_channels(State(state): State<DcodrState>) -> Json<Vec<FollowRequest>> {
    let followed = state
        .registry
        .list()
        .iter()
        .filter_map(ChannelReference::as_follow)
        .cloned()
        .collect();
    Json(followed)
}

/// Follows a control channel, requesting a traffic capture for every group
/// voice grant it carries.
#[utoipa::path(
    post,
    path = "/channels/control",
    tag = "dcodr",
    request_body = p25model::FollowRequest,
    responses(
        (status = 200, description = "Channel followed"),
        (status = 400, description = "Invalid request", body = super::ErrorBody),
        (status = 409, description = "Channel already followed", body = super::ErrorBody),
        (status = 503, description = "No channelizer could serve the channel", body = super::ErrorBody),
        (status = 504, description = "Channel request timed out", body = super::ErrorBody),
        (status = 500, description = "Internal error", body = super::ErrorBody),
    )
)]
pub async fn follow_control_channel(
    State(state): State<DcodrState>,
    Json(request): Json<FollowRequest>,
) -> Result<StatusCode, ResourceError> {
    request.rf.validate()?;
    let follower = ControlChannelFollower::new(request.clone(), state.traffic.clone());
    let rf = request.rf;
    monitor(&state, request.into(), rf, follower).await?;
    Ok(StatusCode::OK)
}

/// Stops following a control channel. Unknown channels are ignored.
#[utoipa::path(
    delete,
    path = "/channels/control",
    tag = "dcodr",
    request_body = p25model::ControlChannelId,
    responses(
        (status = 200, description = "Channel no longer followed"),
    )
)]
pub async fn unfollow_control_channel(
    State(state): State<DcodrState>,
    Json(channel_id): Json<ControlChannelId>,
) -> StatusCode {
    let id = ChannelId::from(channel_id);
    info!("{} unfollow requested", id);
    state.registry.cancel(&id);
    StatusCode::OK
}

/// Captures one group call until it terminates.
#[utoipa::path(
    post,
    path = "/channels/traffic/group",
    tag = "dcodr",
    request_body = p25model::GroupCaptureRequest,
    responses(
        (status = 200, description = "Capture started"),
        (status = 400, description = "Invalid request", body = super::ErrorBody),
        (status = 409, description = "Call already captured", body = super::ErrorBody),
        (status = 503, description = "No channelizer could serve the channel", body = super::ErrorBody),
        (status = 504, description = "Channel request timed out", body = super::ErrorBody),
        (status = 500, description = "Internal error", body = super::ErrorBody),
    )
)]
pub async fn capture_group_traffic(
    State(state): State<DcodrState>,
    Json(request): Json<GroupCaptureRequest>,
) -> Result<StatusCode, ResourceError> {
    request.rf.validate()?;
    let capture = GroupTrafficCapture::new(request.clone());
    let rf = request.rf;
    monitor(&state, request.into(), rf, capture).await?;
    Ok(StatusCode::OK)
}
