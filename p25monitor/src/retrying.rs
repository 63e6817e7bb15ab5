//! Control channel monitor that re-qualifies before giving up.
//!
//! ```text
//! Live --inactive--> Delayed --timer--> Qualifying --same site--> followed again, removed
//!                       ^                   |  \
//!                       `---failure, left---'   `--other site or exhausted--> removed
//! ```

use crate::activity::ActivityCounter;
use crate::config_ext::MonitorSettings;
use crate::endpoints::{EndpointError, FollowEndpoint, QualifyEndpoint};
use crate::monitor::{ChannelMonitor, ChannelRegistry, InactiveHandler, MonitorCore, MonitorState};
use crate::task::LeaseTask;
use p25model::{ChannelId, ChannelReference, ControlChannelQualities, FollowRequest, Identifiable};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifyStage {
    /// Waiting for the retry delay to elapse.
    Delayed,
    /// A qualification round-trip is in flight.
    Qualifying,
}

/// An evicted control channel not yet confirmed dead.
pub(crate) struct PendingQualify {
    request: FollowRequest,
    retries_left: u32,
    stage: QualifyStage,
    attempt: AbortHandle,
}

impl PendingQualify {
    pub(crate) fn reference(&self) -> ChannelReference {
        ChannelReference::Follow(self.request.clone())
    }

    /// Stops the pending timer or the in-flight round-trip.
    pub(crate) fn abort(&self) {
        self.attempt.abort();
    }
}

/// Inactive handler scheduling qualification attempts for followed control channels.
#[derive(Clone)]
struct QualifyRetry {
    qualify: Arc<dyn QualifyEndpoint>,
    follow: Arc<dyn FollowEndpoint>,
    retry_count: u32,
    retry_delay: Duration,
    qualify_timeout: Duration,
}

impl QualifyRetry {
    fn schedule(&self, core: &Arc<MonitorCore>, id: ChannelId) -> AbortHandle {
        let attempt = tokio::spawn(self.clone().attempt(Arc::downgrade(core), id));
        attempt.abort_handle()
    }

    async fn attempt(self, core: Weak<MonitorCore>, id: ChannelId) {
        sleep(self.retry_delay).await;

        let request = {
            let Some(core) = core.upgrade() else {
                return;
            };
            let mut state = core.lock();
            let Some(pending) = state.pending.get_mut(&id) else {
                return;
            };
            pending.stage = QualifyStage::Qualifying;
            pending.request.clone()
        };

        debug!("{} qualifying, {:?} max", id, self.qualify_timeout);
        let outcome = timeout(self.qualify_timeout, self.qualify.qualify(&request.rf))
            .await
            .unwrap_or(Err(EndpointError::Timeout(self.qualify_timeout)));

        if let Some(core) = core.upgrade() {
            self.finish(&core, id, outcome);
        }
    }

    fn finish(
        &self,
        core: &Arc<MonitorCore>,
        id: ChannelId,
        outcome: Result<ControlChannelQualities, EndpointError>,
    ) {
        let mut state = core.lock();
        if !state.pending.contains_key(&id) {
            debug!("{} canceled while qualifying", id);
            return;
        }

        match outcome {
            Ok(qualities) => {
                let Some(pending) = state.pending.remove(&id) else {
                    return;
                };
                let observed = ChannelId::Control(qualities.control_channel_id());
                if observed != id {
                    info!("{} replaced by different site {}, removed", id, observed);
                    return;
                }

                info!("{} qualified again, following", id);
                let follow = self.follow.clone();
                let request = pending.request;
                tokio::spawn(async move {
                    if let Err(err) = follow.follow(&request).await {
                        warn!("{} follow after re-qualification failed: {}", request.channel_id(), err);
                    }
                });
            }
            Err(err) => {
                let rescheduled = match state.pending.get_mut(&id) {
                    Some(pending) => {
                        pending.retries_left = pending.retries_left.saturating_sub(1);
                        pending.retries_left > 0
                    }
                    None => false,
                };

                if rescheduled {
                    let attempt = self.schedule(core, id);
                    if let Some(pending) = state.pending.get_mut(&id) {
                        pending.stage = QualifyStage::Delayed;
                        pending.attempt = attempt;
                        warn!(
                            "{} qualify failed ({}), {} attempts left",
                            id, err, pending.retries_left
                        );
                    }
                } else {
                    state.pending.remove(&id);
                    warn!("{} qualify failed ({}), no attempt left, removed", id, err);
                }
            }
        }
    }
}

impl InactiveHandler for QualifyRetry {
    fn on_inactive(
        &self,
        core: &Arc<MonitorCore>,
        state: &mut MonitorState,
        reference: ChannelReference,
    ) {
        let request = match reference {
            ChannelReference::Follow(request) if self.retry_count > 0 => request,
            other => {
                debug!("{} removed from monitor", other.channel_id());
                return;
            }
        };

        let id = request.channel_id();
        info!(
            "{} inactive, qualifying again in {:?} ({} attempts)",
            id, self.retry_delay, self.retry_count
        );
        let attempt = self.schedule(core, id);
        state.pending.insert(
            id,
            PendingQualify {
                request,
                retries_left: self.retry_count,
                stage: QualifyStage::Delayed,
                attempt,
            },
        );
    }
}

/// [`ChannelMonitor`] whose inactive control channels go through up to
/// `control_channel_retry_count` delayed qualifications before being forgotten.
///
/// Pending identities stay visible to `contains` and `list`, and block any
/// new registration, until they are followed again, replaced or exhausted.
pub struct RetryingControlChannelMonitor {
    monitor: ChannelMonitor,
}

impl RetryingControlChannelMonitor {
    pub fn new(
        settings: MonitorSettings,
        qualify: Arc<dyn QualifyEndpoint>,
        follow: Arc<dyn FollowEndpoint>,
    ) -> Self {
        let handler = QualifyRetry {
            qualify,
            follow,
            retry_count: settings.control_channel_retry_count,
            retry_delay: settings.control_channel_retry_delay,
            qualify_timeout: settings.qualify_timeout,
        };
        Self {
            monitor: ChannelMonitor::with_handler(settings, Box::new(handler)),
        }
    }

    /// Where `id` stands in re-qualification, `None` when it is live or unknown.
    pub fn qualify_stage(&self, id: &ChannelId) -> Option<QualifyStage> {
        self.monitor.core().lock().pending.get(id).map(|p| p.stage)
    }

    pub fn settings(&self) -> &MonitorSettings {
        self.monitor.settings()
    }
}

impl ChannelRegistry for RetryingControlChannelMonitor {
    fn contains(&self, id: &ChannelId) -> bool {
        self.monitor.contains(id)
    }

    fn register(
        &self,
        reference: ChannelReference,
        task: Box<dyn LeaseTask>,
        activity: ActivityCounter,
    ) -> bool {
        self.monitor.register(reference, task, activity)
    }

    fn cancel(&self, id: &ChannelId) {
        self.monitor.cancel(id)
    }

    fn list(&self) -> Vec<ChannelReference> {
        self.monitor.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::Result;
    use crate::monitor::tests::{MockTask, follow, settings};
    use async_trait::async_trait;
    use p25model::{GroupCaptureRequest, GroupChannelId, QualifyRequest};
    use std::sync::Mutex;
    use tokio::sync::{mpsc, oneshot};

    /// Qualify endpoint answering with whatever the test feeds it.
    struct ScriptedQualify {
        answers: tokio::sync::Mutex<mpsc::Receiver<Result<ControlChannelQualities>>>,
        calls: mpsc::UnboundedSender<QualifyRequest>,
    }

    #[async_trait]
    impl QualifyEndpoint for ScriptedQualify {
        async fn qualify(&self, request: &QualifyRequest) -> Result<ControlChannelQualities> {
            let _ = self.calls.send(*request);
            match self.answers.lock().await.recv().await {
                Some(answer) => answer,
                None => Err(EndpointError::NoQualities),
            }
        }
    }

    #[derive(Default)]
    struct RecordingFollow {
        requests: Mutex<Vec<FollowRequest>>,
        done: Mutex<Option<oneshot::Sender<()>>>,
    }

    #[async_trait]
    impl FollowEndpoint for RecordingFollow {
        async fn follow(&self, request: &FollowRequest) -> Result<()> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(done) = self.done.lock().unwrap().take() {
                let _ = done.send(());
            }
            Ok(())
        }
    }

    struct Harness {
        monitor: RetryingControlChannelMonitor,
        answers: mpsc::Sender<Result<ControlChannelQualities>>,
        calls: mpsc::UnboundedReceiver<QualifyRequest>,
        follow: Arc<RecordingFollow>,
    }

    fn harness(retry_count: u32) -> Harness {
        harness_with_delay(retry_count, Duration::ZERO)
    }

    fn harness_with_delay(retry_count: u32, retry_delay: Duration) -> Harness {
        let (answers_tx, answers_rx) = mpsc::channel(4);
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        let follow = Arc::new(RecordingFollow::default());
        let monitor = RetryingControlChannelMonitor::new(
            MonitorSettings {
                control_channel_retry_count: retry_count,
                control_channel_retry_delay: retry_delay,
                qualify_timeout: Duration::from_secs(60),
                ..settings(1.0)
            },
            Arc::new(ScriptedQualify {
                answers: tokio::sync::Mutex::new(answers_rx),
                calls: calls_tx,
            }),
            follow.clone(),
        );
        Harness {
            monitor,
            answers: answers_tx,
            calls: calls_rx,
            follow,
        }
    }

    fn qualities(site_id: i32) -> ControlChannelQualities {
        let id = follow(site_id).channel_id;
        ControlChannelQualities {
            wacn: id.wacn,
            system_id: id.system_id,
            local_reg_area: 0,
            rf_subsystem_id: id.rf_subsystem_id,
            site_id: id.site_id,
            manufacturer_id: 0,
            fss_connected: true,
            system_services: 0,
            frequency: 851_012_500.0,
            data_unit_count: 12,
        }
    }

    /// Registers an idle follow lease and waits until the sweep hands it to qualification.
    async fn evict(harness: &mut Harness) -> (ChannelId, MockTask) {
        let task = MockTask::default();
        assert!(harness.monitor.register(follow(1).into(), Box::new(task.clone()), ActivityCounter::new()));
        harness.calls.recv().await.unwrap();
        (follow(1).channel_id(), task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_requalified_channel_is_followed_once() {
        let mut harness = harness(1);
        let (done_tx, done_rx) = oneshot::channel();
        *harness.follow.done.lock().unwrap() = Some(done_tx);

        let (id, task) = evict(&mut harness).await;
        assert_eq!(task.cancels(), 1);
        assert!(harness.monitor.contains(&id));
        assert_eq!(harness.monitor.qualify_stage(&id), Some(QualifyStage::Qualifying));
        assert_eq!(harness.monitor.list().len(), 1);

        harness.answers.send(Ok(qualities(1))).await.unwrap();
        done_rx.await.unwrap();

        assert!(!harness.monitor.contains(&id));
        assert!(harness.monitor.list().is_empty());
        assert_eq!(*harness.follow.requests.lock().unwrap(), vec![follow(1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_qualify_removes_without_follow() {
        let mut harness = harness(1);
        let (id, _) = evict(&mut harness).await;

        harness.answers.send(Err(EndpointError::NoQualities)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!harness.monitor.contains(&id));
        assert!(harness.follow.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_with_attempts_left_is_delayed_again() {
        let mut harness = harness(2);
        let (id, _) = evict(&mut harness).await;

        harness.answers.send(Err(EndpointError::NoQualities)).await.unwrap();
        harness.calls.recv().await.unwrap();
        assert_eq!(harness.monitor.qualify_stage(&id), Some(QualifyStage::Qualifying));

        harness.answers.send(Err(EndpointError::NoQualities)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!harness.monitor.contains(&id));
        assert!(harness.follow.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_site_is_removed() {
        let mut harness = harness(3);
        let (id, _) = evict(&mut harness).await;

        harness.answers.send(Ok(qualities(9))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!harness.monitor.contains(&id));
        assert!(harness.calls.try_recv().is_err());
        assert!(harness.follow.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_identity_blocks_registration() {
        let mut harness = harness(1);
        let (id, _) = evict(&mut harness).await;

        assert!(!harness.monitor.register(follow(1).into(), Box::new(MockTask::default()), ActivityCounter::with_count(5)));

        harness.monitor.cancel(&id);
        assert!(!harness.monitor.contains(&id));
        assert!(harness.monitor.register(follow(1).into(), Box::new(MockTask::default()), ActivityCounter::with_count(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_while_delayed_stops_timer() {
        let mut harness = harness_with_delay(1, Duration::from_secs(30));
        let id = follow(1).channel_id();

        harness.monitor.register(follow(1).into(), Box::new(MockTask::default()), ActivityCounter::new());
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(harness.monitor.qualify_stage(&id), Some(QualifyStage::Delayed));

        harness.monitor.cancel(&id);
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(!harness.monitor.contains(&id));
        assert!(harness.calls.try_recv().is_err());
        assert!(harness.follow.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_and_zero_retry_are_removed() {
        let harness = harness(0);
        let capture = GroupCaptureRequest::new(
            follow(1).rf,
            GroupChannelId::new(0xBEE00, 0x1A2, 1, 42, 7, 851_012_500.0),
        );

        harness.monitor.register(follow(1).into(), Box::new(MockTask::default()), ActivityCounter::new());
        harness.monitor.register(capture.clone().into(), Box::new(MockTask::default()), ActivityCounter::new());
        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert!(!harness.monitor.contains(&follow(1).channel_id()));
        assert!(!harness.monitor.contains(&capture.channel_id()));
        assert!(harness.monitor.list().is_empty());
    }
}
