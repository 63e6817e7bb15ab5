//! Bounded pool running one decoding pipeline per leased channel.

use crate::decoder::{DataUnit, DataUnitDecoder};
use crate::sinks::{DataUnitSink, SinkFlow};
use p25chnlzr::StreamEvent;
use p25monitor::ActivityCounter;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, spawn_blocking};
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// Why a pipeline ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineEnd {
    Cancelled,
    /// The sink asked to stop.
    SinkDone,
    /// The stream of events ended: the source was closed or released.
    SourceClosed,
    /// The decoder panicked.
    DecoderFailed,
}

#[derive(Debug)]
pub struct PipelineExit<S> {
    pub sink: S,
    pub end: PipelineEnd,
}

/// Running pipeline: its cancellation token and the task that returns its sink.
pub struct PipelineHandle<S> {
    cancel: CancellationToken,
    join: JoinHandle<PipelineExit<S>>,
}

impl<S> PipelineHandle<S> {
    /// Token handed to the registry as the lease's task.
    pub fn canceller(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<PipelineExit<S>, JoinError> {
        self.join.await
    }

    /// Cancels, then waits for the sink.
    pub async fn stop(self) -> Result<PipelineExit<S>, JoinError> {
        self.cancel.cancel();
        self.join.await
    }

    pub(crate) fn join_mut(&mut self) -> &mut JoinHandle<PipelineExit<S>> {
        &mut self.join
    }
}

/// At most `size` pipelines decode at once; the others wait for a slot.
///
/// Decoding runs on the blocking thread pool, one event at a time per
/// pipeline, so the runtime workers only move events around.
#[derive(Debug, Clone)]
pub struct DspPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl DspPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Starts decoding `events` into `sink`, counting every decoded unit on `activity`.
    pub fn submit<S: DataUnitSink>(
        &self,
        events: mpsc::Receiver<StreamEvent>,
        decoder: Box<dyn DataUnitDecoder>,
        sink: S,
        activity: ActivityCounter,
    ) -> PipelineHandle<S> {
        let cancel = CancellationToken::new();
        let pipeline = Pipeline {
            events,
            decoder: Some(decoder),
            sink,
            activity,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(pipeline.run(self.permits.clone()));
        PipelineHandle { cancel, join }
    }
}

struct Pipeline<S> {
    events: mpsc::Receiver<StreamEvent>,
    /// Away while an event is being decoded.
    decoder: Option<Box<dyn DataUnitDecoder>>,
    sink: S,
    activity: ActivityCounter,
    cancel: CancellationToken,
}

impl<S: DataUnitSink> Pipeline<S> {
    async fn run(mut self, permits: Arc<Semaphore>) -> PipelineExit<S> {
        let _permit = tokio::select! {
            _ = self.cancel.cancelled() => return self.exit(PipelineEnd::Cancelled),
            permit = permits.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.exit(PipelineEnd::Cancelled),
            },
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.exit(PipelineEnd::Cancelled),
                event = self.events.recv() => event,
            };
            let Some(event) = event else {
                return self.exit(PipelineEnd::SourceClosed);
            };

            let Some(units) = self.decode(event).await else {
                return self.exit(PipelineEnd::DecoderFailed);
            };
            for unit in units {
                self.activity.increment();
                if self.sink.consume(&unit) == SinkFlow::Stop {
                    return self.exit(PipelineEnd::SinkDone);
                }
            }
        }
    }

    async fn decode(&mut self, event: StreamEvent) -> Option<Vec<DataUnit>> {
        let mut decoder = self.decoder.take()?;
        let decoded = spawn_blocking(move || {
            let units = decoder.decode(&event);
            (decoder, units)
        })
        .await;

        match decoded {
            Ok((decoder, units)) => {
                self.decoder = Some(decoder);
                Some(units)
            }
            Err(err) => {
                error!("decoder failed: {}", err);
                None
            }
        }
    }

    fn exit(self, end: PipelineEnd) -> PipelineExit<S> {
        trace!("pipeline ended: {:?}", end);
        PipelineExit {
            sink: self.sink,
            end,
        }
    }
}
