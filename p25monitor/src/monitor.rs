//! Lease registry with inactivity sweeps.
//!
//! One mutex guards every lease, every pending re-qualification and the sweep
//! timers, so a `register` can never interleave with a sweep or with a
//! qualification-driven removal of the same identity.

use crate::activity::ActivityCounter;
use crate::config_ext::MonitorSettings;
use crate::retrying::PendingQualify;
use crate::task::LeaseTask;
use p25model::{ChannelId, ChannelKind, ChannelReference, Identifiable};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

/// What the HTTP layer needs from a registry.
pub trait ChannelRegistry: Send + Sync {
    /// `true` while `id` has a lease or a pending re-qualification.
    fn contains(&self, id: &ChannelId) -> bool;

    /// Check-and-insert. Returns `false` without any change when `reference`'s
    /// identity is already present.
    fn register(
        &self,
        reference: ChannelReference,
        task: Box<dyn LeaseTask>,
        activity: ActivityCounter,
    ) -> bool;

    /// Drops whatever is known about `id` and cancels its task. No-op when absent.
    fn cancel(&self, id: &ChannelId);

    fn list(&self) -> Vec<ChannelReference>;
}

pub(crate) struct LeaseRecord {
    pub(crate) reference: ChannelReference,
    task: Box<dyn LeaseTask>,
    activity: ActivityCounter,
    registered_at: Instant,
}

#[derive(Default)]
pub(crate) struct MonitorState {
    pub(crate) leases: HashMap<ChannelId, LeaseRecord>,
    pub(crate) pending: HashMap<ChannelId, PendingQualify>,
    sweepers: HashMap<ChannelKind, AbortHandle>,
}

/// Decides what becomes of an evicted lease.
///
/// Called with the registry lock held, after the lease left `state.leases`
/// and its task was cancelled.
pub(crate) trait InactiveHandler: Send + Sync {
    fn on_inactive(
        &self,
        core: &Arc<MonitorCore>,
        state: &mut MonitorState,
        reference: ChannelReference,
    );
}

/// Plain removal.
pub(crate) struct RemoveInactive;

impl InactiveHandler for RemoveInactive {
    fn on_inactive(&self, _: &Arc<MonitorCore>, _: &mut MonitorState, reference: ChannelReference) {
        debug!("{} removed from monitor", reference.channel_id());
    }
}

pub(crate) struct MonitorCore {
    state: Mutex<MonitorState>,
    settings: MonitorSettings,
    handler: Box<dyn InactiveHandler>,
}

impl MonitorCore {
    pub(crate) fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Starts the sweep timer of `kind` unless one is already running.
    fn arm(self: &Arc<Self>, state: &mut MonitorState, kind: ChannelKind) {
        if state.sweepers.get(&kind).is_some_and(|h| !h.is_finished()) {
            return;
        }

        let period = self.settings.sweep_interval(kind);
        let core = Arc::downgrade(self);
        let sweeper = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                let Some(core) = Weak::upgrade(&core) else {
                    break;
                };
                if !core.sweep(kind) {
                    break;
                }
            }
        });
        debug!("{:?} sweep armed every {:?}", kind, period);
        state.sweepers.insert(kind, sweeper.abort_handle());
    }

    /// One sweep over the leases of `kind`. Returns `false`, after disarming,
    /// once no lease of that kind is left.
    ///
    /// A lease joins the running timer's schedule, so it is only judged once
    /// it has been registered for a full period.
    fn sweep(self: &Arc<Self>, kind: ChannelKind) -> bool {
        let mut state = self.lock();
        let period = self.settings.sweep_interval(kind);
        let now = Instant::now();

        let inactive: Vec<ChannelId> = state
            .leases
            .iter()
            .filter(|(id, _)| id.kind() == kind)
            .filter(|(_, record)| now.saturating_duration_since(record.registered_at) >= period)
            .filter(|(_, record)| record.activity.take() == 0)
            .map(|(id, _)| *id)
            .collect();

        for id in inactive {
            let Some(record) = state.leases.remove(&id) else {
                continue;
            };
            if record.task.cancel() {
                warn!("{} hit inactive threshold, canceled", id);
            } else {
                warn!("{} hit inactive threshold, task already stopped", id);
            }
            self.handler.on_inactive(self, &mut state, record.reference);
        }

        let remaining = state.leases.keys().any(|id| id.kind() == kind);
        if !remaining {
            state.sweepers.remove(&kind);
            debug!("{:?} sweep disarmed", kind);
        }
        remaining
    }
}

impl Drop for MonitorCore {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for sweeper in state.sweepers.values() {
            sweeper.abort();
        }
        for pending in state.pending.values() {
            pending.abort();
        }
    }
}

/// Registry evicting every lease whose activity counter did not move during a
/// full sweep period.
///
/// Control identities are swept every `1s / min_control_data_unit_rate`,
/// the others every `1s / min_traffic_data_unit_rate`. A timer only runs
/// while leases of its kind exist.
pub struct ChannelMonitor {
    core: Arc<MonitorCore>,
}

impl ChannelMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self::with_handler(settings, Box::new(RemoveInactive))
    }

    pub(crate) fn with_handler(settings: MonitorSettings, handler: Box<dyn InactiveHandler>) -> Self {
        Self {
            core: Arc::new(MonitorCore {
                state: Mutex::new(MonitorState::default()),
                settings,
                handler,
            }),
        }
    }

    pub(crate) fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }

    pub fn settings(&self) -> &MonitorSettings {
        self.core.settings()
    }

    /// Number of live leases, pending re-qualifications excluded.
    pub fn lease_count(&self) -> usize {
        self.core.lock().leases.len()
    }
}

impl ChannelRegistry for ChannelMonitor {
    fn contains(&self, id: &ChannelId) -> bool {
        let state = self.core.lock();
        state.leases.contains_key(id) || state.pending.contains_key(id)
    }

    fn register(
        &self,
        reference: ChannelReference,
        task: Box<dyn LeaseTask>,
        activity: ActivityCounter,
    ) -> bool {
        let id = reference.channel_id();
        let mut state = self.core.lock();
        if state.leases.contains_key(&id) || state.pending.contains_key(&id) {
            debug!("{} already monitored", id);
            return false;
        }

        state.leases.insert(
            id,
            LeaseRecord {
                reference,
                task,
                activity,
                registered_at: Instant::now(),
            },
        );
        self.core.arm(&mut state, id.kind());
        info!("{} registered", id);
        true
    }

    fn cancel(&self, id: &ChannelId) {
        let mut state = self.core.lock();
        if let Some(record) = state.leases.remove(id) {
            if record.task.cancel() {
                info!("{} canceled", id);
            } else {
                debug!("{} removed, task already stopped", id);
            }
        }
        if let Some(pending) = state.pending.remove(id) {
            pending.abort();
            info!("{} re-qualification canceled", id);
        }
    }

    fn list(&self) -> Vec<ChannelReference> {
        let state = self.core.lock();
        state
            .leases
            .values()
            .map(|record| record.reference.clone())
            .chain(state.pending.values().map(PendingQualify::reference))
            .collect()
    }
}
