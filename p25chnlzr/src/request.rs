use crate::codec::ChannelRequest;
use p25model::RfAttributes;

/// Bandwidth of a P25 channel, in Hz.
pub const P25_CHANNEL_WIDTH: f64 = 12_500.0;
/// Sample rate the decoder works at, in Hz.
pub const P25_SAMPLE_RATE: u64 = 48_000;

impl ChannelRequest {
    /// Request for a P25 channel centered on `rf.frequency`.
    pub fn p25(rf: &RfAttributes, max_rate_diff: u64) -> Self {
        Self {
            latitude: rf.latitude,
            longitude: rf.longitude,
            max_location_diff: 0.0,
            polarization: rf.polarization,
            center_frequency: rf.frequency,
            bandwidth: P25_CHANNEL_WIDTH,
            sample_rate: P25_SAMPLE_RATE,
            max_rate_diff,
        }
    }
}
