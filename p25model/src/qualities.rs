use crate::ControlChannelId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// What a qualification probe observed on a control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ControlChannelQualities {
    pub wacn: i32,
    pub system_id: i32,
    pub local_reg_area: i32,
    pub rf_subsystem_id: i32,
    pub site_id: i32,
    pub manufacturer_id: i32,
    pub fss_connected: bool,
    pub system_services: i32,
    pub frequency: f64,
    pub data_unit_count: u64,
}

impl ControlChannelQualities {
    /// Identity of the site that answered the probe.
    pub fn control_channel_id(&self) -> ControlChannelId {
        ControlChannelId::new(self.wacn, self.system_id, self.rf_subsystem_id, self.site_id)
    }
}
