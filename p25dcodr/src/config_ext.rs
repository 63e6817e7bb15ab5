//! Extension adding the decoder getters of the `dcodr` section to `p25config::Config`

use p25config::Config;
use std::time::Duration;

const DEFAULT_DSP_POOL_SIZE: u64 = 4;
const DEFAULT_MAX_RATE_DIFF: u64 = 2_000;
const DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_CHANNEL_QUALIFY_TIME_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct DcodrSettings {
    /// Channel pipelines decoding at the same time.
    pub dsp_pool_size: usize,
    pub max_rate_diff: u64,
    /// Bound on one channel acquisition.
    pub channel_request_timeout: Duration,
    /// How long a qualification listens to the channel.
    pub channel_qualify_time: Duration,
}

impl Default for DcodrSettings {
    fn default() -> Self {
        Self {
            dsp_pool_size: DEFAULT_DSP_POOL_SIZE as usize,
            max_rate_diff: DEFAULT_MAX_RATE_DIFF,
            channel_request_timeout: Duration::from_millis(DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS),
            channel_qualify_time: Duration::from_millis(DEFAULT_CHANNEL_QUALIFY_TIME_MS),
        }
    }
}

pub trait DcodrConfigExt {
    fn get_dcodr_settings(&self) -> DcodrSettings;
}

impl DcodrConfigExt for Config {
    fn get_dcodr_settings(&self) -> DcodrSettings {
        let pool_size = self.get_u64_or(&["dcodr", "dsp_pool_size"], DEFAULT_DSP_POOL_SIZE);
        DcodrSettings {
            dsp_pool_size: usize::try_from(pool_size).unwrap_or(1).max(1),
            max_rate_diff: self.get_u64_or(&["dcodr", "max_rate_diff"], DEFAULT_MAX_RATE_DIFF),
            channel_request_timeout: Duration::from_millis(self.get_u64_or(
                &["dcodr", "channel_request_timeout_ms"],
                DEFAULT_CHANNEL_REQUEST_TIMEOUT_MS,
            )),
            channel_qualify_time: Duration::from_millis(self.get_u64_or(
                &["dcodr", "channel_qualify_time_ms"],
                DEFAULT_CHANNEL_QUALIFY_TIME_MS,
            )),
        }
    }
}
