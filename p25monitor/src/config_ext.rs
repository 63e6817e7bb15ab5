//! Extension adding the monitor getters of the `dcodr` section to `p25config::Config`

use p25config::Config;
use p25model::ChannelKind;
use std::time::Duration;

const DEFAULT_MIN_CONTROL_DATA_UNIT_RATE: f64 = 1.0;
const DEFAULT_MIN_TRAFFIC_DATA_UNIT_RATE: f64 = 0.5;
const DEFAULT_CONTROL_CHANNEL_RETRY_COUNT: u64 = 3;
const DEFAULT_CONTROL_CHANNEL_RETRY_DELAY_MS: u64 = 5_000;
const DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CHANNEL_QUALIFY_TIME_MS: u64 = 10_000;
/// Slack added on top of acquisition and qualification time for one qualify round-trip.
const QUALIFY_ROUND_TRIP_SLACK_MS: u64 = 2_500;
/// Slowest sweep cadence accepted, whatever the configured rate.
const MIN_DATA_UNIT_RATE: f64 = 0.001;
/// Fastest sweep cadence accepted, whatever the configured rate.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Snapshot of the monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub min_control_data_unit_rate: f64,
    pub min_traffic_data_unit_rate: f64,
    pub control_channel_retry_count: u32,
    pub control_channel_retry_delay: Duration,
    /// Bound on one qualification round-trip.
    pub qualify_timeout: Duration,
}

impl MonitorSettings {
    /// `1000ms / min_data_unit_rate` for the kind of channel.
    pub fn sweep_interval(&self, kind: ChannelKind) -> Duration {
        let rate = match kind {
            ChannelKind::Control => self.min_control_data_unit_rate,
            ChannelKind::Traffic => self.min_traffic_data_unit_rate,
        };
        Duration::from_secs_f64(1.0 / rate.max(MIN_DATA_UNIT_RATE)).max(MIN_SWEEP_INTERVAL)
    }

    pub fn qualify_timeout_for(request_timeout: Duration, qualify_time: Duration) -> Duration {
        request_timeout + qualify_time + Duration::from_millis(QUALIFY_ROUND_TRIP_SLACK_MS)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            min_control_data_unit_rate: DEFAULT_MIN_CONTROL_DATA_UNIT_RATE,
            min_traffic_data_unit_rate: DEFAULT_MIN_TRAFFIC_DATA_UNIT_RATE,
            control_channel_retry_count: DEFAULT_CONTROL_CHANNEL_RETRY_COUNT as u32,
            control_channel_retry_delay: Duration::from_millis(DEFAULT_CONTROL_CHANNEL_RETRY_DELAY_MS),
            qualify_timeout: Self::qualify_timeout_for(
                Duration::from_millis(DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS),
                Duration::from_millis(DEFAULT_CHANNEL_QUALIFY_TIME_MS),
            ),
        }
    }
}

pub trait MonitorConfigExt {
    fn get_monitor_settings(&self) -> MonitorSettings;
}

impl MonitorConfigExt for Config {
    fn get_monitor_settings(&self) -> MonitorSettings {
        let request_timeout = self.get_u64_or(
            &["dcodr", "channel_request_timeout_ms"],
            DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS,
        );
        let qualify_time = self.get_u64_or(
            &["dcodr", "channel_qualify_time_ms"],
            DEFAULT_CHANNEL_QUALIFY_TIME_MS,
        );
        let retry_count = self.get_u64_or(
            &["dcodr", "control_channel_retry_count"],
            DEFAULT_CONTROL_CHANNEL_RETRY_COUNT,
        );

        MonitorSettings {
            min_control_data_unit_rate: self.get_f64_or(
                &["dcodr", "min_control_data_unit_rate"],
                DEFAULT_MIN_CONTROL_DATA_UNIT_RATE,
            ),
            min_traffic_data_unit_rate: self.get_f64_or(
                &["dcodr", "min_traffic_data_unit_rate"],
                DEFAULT_MIN_TRAFFIC_DATA_UNIT_RATE,
            ),
            control_channel_retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
            control_channel_retry_delay: Duration::from_millis(self.get_u64_or(
                &["dcodr", "control_channel_retry_delay_ms"],
                DEFAULT_CONTROL_CHANNEL_RETRY_DELAY_MS,
            )),
            qualify_timeout: MonitorSettings::qualify_timeout_for(
                Duration::from_millis(request_timeout),
                Duration::from_millis(qualify_time),
            ),
        }
    }
}
