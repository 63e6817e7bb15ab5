//! Acquisition and lifetime of monitored channels.

use super::error::log_source_closed;
use super::{DcodrState, ResourceError};
use crate::dsp::{PipelineEnd, PipelineHandle};
use crate::sinks::DataUnitSink;
use p25chnlzr::{ChannelRequest, SamplesSource, SourceCloser};
use p25model::{ChannelId, ChannelReference, Identifiable, RfAttributes};
use p25monitor::{ActivityCounter, ChannelRegistry};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

/// Identities whose acquisition is in flight.
#[derive(Debug, Clone, Default)]
pub(crate) struct PendingRequests {
    ids: Arc<Mutex<HashSet<ChannelId>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashSet<ChannelId>> {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `id` unless it is pending or already in `registry`. The claim
    /// lasts as long as the returned guard.
    pub(crate) fn reserve(
        &self,
        id: ChannelId,
        registry: &dyn ChannelRegistry,
    ) -> Result<PendingGuard, ResourceError> {
        let mut ids = self.lock();
        if ids.contains(&id) || registry.contains(&id) {
            return Err(ResourceError::Conflict(id));
        }
        ids.insert(id);
        Ok(PendingGuard {
            pending: self.clone(),
            id,
        })
    }
}

pub(crate) struct PendingGuard {
    pending: PendingRequests,
    id: ChannelId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.id);
    }
}

/// Leases a P25 channel centered on `rf.frequency` within the request timeout.
pub(crate) async fn acquire(
    state: &DcodrState,
    id: &ChannelId,
    rf: &RfAttributes,
) -> Result<SamplesSource, ResourceError> {
    let request = ChannelRequest::p25(rf, state.settings.max_rate_diff);
    info!("{} requesting sample source", id);
    state
        .chnlzr
        .acquire_within(&request, state.settings.channel_request_timeout)
        .await
        .map_err(|err| ResourceError::acquisition(id, err))
}

/// Acquires the channel of `reference`, decodes it into `sink` and registers
/// the lease until it is canceled, evicted or closed by the host.
pub(crate) async fn monitor<S: DataUnitSink>(
    state: &DcodrState,
    reference: ChannelReference,
    rf: RfAttributes,
    sink: S,
) -> Result<(), ResourceError> {
    let id = reference.channel_id();
    let _pending = state.pending.reserve(id, state.registry.as_ref())?;

    let mut source = acquire(state, &id, &rf).await?;
    let Some(events) = source.take_events() else {
        source.release();
        return Err(ResourceError::Internal(format!("{} source already consumed", id)));
    };

    let activity = ActivityCounter::new();
    let pipeline = state
        .dsp
        .submit(events, state.decoders.create(), sink, activity.clone());

    if !state
        .registry
        .register(reference, Box::new(pipeline.canceller()), activity)
    {
        pipeline.cancel();
        source.release();
        return Err(ResourceError::Conflict(id));
    }

    info!("{} now monitored", id);
    tokio::spawn(cleanup(id, source.closer(), pipeline));
    Ok(())
}

/// Whichever of the pipeline and the source ends first tears the other down.
async fn cleanup<S: Send + 'static>(
    id: ChannelId,
    closer: SourceCloser,
    mut pipeline: PipelineHandle<S>,
) {
    tokio::select! {
        exit = pipeline.join_mut() => {
            closer.release();
            match exit {
                Ok(exit) if exit.end == PipelineEnd::SourceClosed => {
                    log_source_closed(&id, &closer.closed().await);
                }
                Ok(exit) if exit.end == PipelineEnd::DecoderFailed => {
                    error!("{} decoder failed, channel released", id);
                }
                Ok(exit) => debug!("{} pipeline ended: {:?}", id, exit.end),
                Err(err) => error!("{} unexpected dsp error while decoding channel: {}", id, err),
            }
        }
        closed = closer.closed() => {
            pipeline.cancel();
            log_source_closed(&id, &closed);
        }
    }
}
