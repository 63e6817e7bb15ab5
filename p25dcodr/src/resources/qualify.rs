use super::lease::acquire;
use super::{DcodrState, ResourceError};
use crate::dsp::PipelineEnd;
use crate::sinks::ControlChannelQualifier;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use p25model::{ChannelId, QualifyChannelId, QualifyRequest};
use p25monitor::ActivityCounter;
use tokio::time::sleep;
use tracing::{error, info};

/// Listens to a frequency for the qualify window and reports the control
/// channel heard on it.
///
/// # Responses
///
/// * `200 OK` - a site status was decoded
/// * `204 NO_CONTENT` - nothing identifiable was heard
/// * `400`, `503`, `504`, `500` - see [`ResourceError`]
#[utoipa::path(
    post,
    path = "/qualify",
    tag = "dcodr",
    request_body = p25model::RfAttributes,
    responses(
        (status = 200, description = "Control channel identified", body = p25model::ControlChannelQualities),
        (status = 204, description = "No control channel heard"),
        (status = 400, description = "Invalid request", body = super::ErrorBody),
        (status = 503, description = "No channelizer could serve the channel", body = super::ErrorBody),
        (status = 504, description = "Channel request timed out", body = super::ErrorBody),
        (status = 500, description = "Internal error", body = super::ErrorBody),
    )
)]
pub async fn qualify(
    State(state): State<DcodrState>,
    Json(request): Json<QualifyRequest>,
) -> Result<Response, ResourceError> {
    request.validate()?;
    let id = ChannelId::Qualify(QualifyChannelId {
        frequency: request.frequency,
    });

    let mut source = acquire(&state, &id, &request).await?;
    let Some(events) = source.take_events() else {
        source.release();
        return Err(ResourceError::Internal(format!("{} source already consumed", id)));
    };
    let mut pipeline = state.dsp.submit(
        events,
        state.decoders.create(),
        ControlChannelQualifier::new(),
        ActivityCounter::new(),
    );

    let ended_early = tokio::select! {
        _ = sleep(state.settings.channel_qualify_time) => None,
        exit = pipeline.join_mut() => Some(exit),
    };
    let exit = match ended_early {
        Some(exit) => exit,
        None => pipeline.stop().await,
    };
    source.release();

    let exit = exit.map_err(|err| {
        error!("{} unexpected dsp error while qualifying: {}", id, err);
        ResourceError::Internal(err.to_string())
    })?;
    match exit.end {
        PipelineEnd::SourceClosed => {
            return Err(ResourceError::source_closed(&id, source.closed().await));
        }
        PipelineEnd::DecoderFailed => {
            return Err(ResourceError::Internal(format!("{} decoder failed", id)));
        }
        PipelineEnd::Cancelled | PipelineEnd::SinkDone => {}
    }

    match exit.sink.qualities() {
        Some(qualities) => {
            info!("{} qualified as {}", id, ChannelId::from(qualities.control_channel_id()));
            Ok((StatusCode::OK, Json(qualities)).into_response())
        }
        None => {
            info!("{} no control channel heard", id);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}
