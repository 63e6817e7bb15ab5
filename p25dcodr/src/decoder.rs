//! Boundary between the sample stream and the P25 protocol layer.
//!
//! Demodulation and trunking message parsing live behind [`DataUnitDecoder`];
//! the sinks only ever see decoded [`DataUnit`]s.

use p25chnlzr::{ChannelState, StreamEvent};
use std::sync::Arc;

/// Site identity broadcast on a control channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStatus {
    pub wacn: i32,
    pub system_id: i32,
    pub local_reg_area: i32,
    pub rf_subsystem_id: i32,
    pub site_id: i32,
    pub manufacturer_id: i32,
    pub fss_connected: bool,
    pub system_services: i32,
    /// Downlink frequency of the control channel, once known.
    pub frequency: Option<f64>,
}

/// One intact data unit.
#[derive(Debug, Clone, PartialEq)]
pub enum DataUnit {
    SiteStatus(SiteStatus),
    /// A group call was granted a traffic channel.
    GroupVoiceGrant {
        source_id: i32,
        group_id: i32,
        frequency: f64,
    },
    /// End of a call.
    Terminator,
    Other,
}

pub trait DataUnitDecoder: Send {
    /// Feeds one stream event and returns the data units it completed.
    fn decode(&mut self, event: &StreamEvent) -> Vec<DataUnit>;
}

/// Builds one decoder per channel pipeline.
pub trait DecoderFactory: Send + Sync {
    fn create(&self) -> Box<dyn DataUnitDecoder>;
}

impl<F> DecoderFactory for F
where
    F: Fn() -> Box<dyn DataUnitDecoder> + Send + Sync,
{
    fn create(&self) -> Box<dyn DataUnitDecoder> {
        self()
    }
}

pub type SharedDecoderFactory = Arc<dyn DecoderFactory>;

/// Reports one [`DataUnit::Other`] per non-empty sample block received at the
/// negotiated sample rate.
#[derive(Debug, Default)]
pub struct SampleBlockDecoder {
    state: Option<ChannelState>,
}

impl SampleBlockDecoder {
    pub fn factory() -> SharedDecoderFactory {
        Arc::new(|| Box::new(SampleBlockDecoder::default()) as Box<dyn DataUnitDecoder>)
    }
}

impl DataUnitDecoder for SampleBlockDecoder {
    fn decode(&mut self, event: &StreamEvent) -> Vec<DataUnit> {
        match event {
            StreamEvent::StateChanged(state) => {
                self.state = Some(*state);
                Vec::new()
            }
            StreamEvent::Samples(samples) if !samples.is_empty() && self.state.is_some() => {
                vec![DataUnit::Other]
            }
            StreamEvent::Samples(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p25chnlzr::Complex;

    #[test]
    fn test_blocks_count_after_state() {
        let mut decoder = SampleBlockDecoder::default();
        let block = StreamEvent::Samples(vec![Complex::default(); 4].into());

        assert!(decoder.decode(&block).is_empty());
        decoder.decode(&StreamEvent::StateChanged(ChannelState {
            sample_rate: 48_000,
            center_frequency: 851_012_500.0,
        }));
        assert_eq!(decoder.decode(&block), vec![DataUnit::Other]);
        assert!(decoder.decode(&StreamEvent::Samples(Vec::<Complex>::new().into())).is_empty());
    }
}
