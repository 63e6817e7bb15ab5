use crate::{ControlChannelId, GroupChannelId, ValidationError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where and how to listen: receiver position, polarization and center frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RfAttributes {
    pub latitude: f64,
    pub longitude: f64,
    pub polarization: i32,
    pub frequency: f64,
}

impl RfAttributes {
    pub fn new(latitude: f64, longitude: f64, polarization: i32, frequency: f64) -> Self {
        Self {
            latitude,
            longitude,
            polarization,
            frequency,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.latitude.is_finite() {
            return Err(ValidationError::Coordinate(self.latitude));
        }
        if !self.longitude.is_finite() {
            return Err(ValidationError::Coordinate(self.longitude));
        }
        if self.polarization < 0 {
            return Err(ValidationError::Polarization(self.polarization));
        }
        if !(self.frequency >= 1.0) {
            return Err(ValidationError::Frequency(self.frequency));
        }
        Ok(())
    }
}

/// Body of `POST /qualify`.
pub type QualifyRequest = RfAttributes;

/// Body of `POST /channels/control`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FollowRequest {
    #[serde(flatten)]
    pub rf: RfAttributes,
    pub channel_id: ControlChannelId,
}

impl FollowRequest {
    pub fn new(rf: RfAttributes, channel_id: ControlChannelId) -> Self {
        Self { rf, channel_id }
    }
}

/// Body of `POST /channels/traffic/group`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCaptureRequest {
    #[serde(flatten)]
    pub rf: RfAttributes,
    pub channel_id: GroupChannelId,
}

impl GroupCaptureRequest {
    pub fn new(rf: RfAttributes, channel_id: GroupChannelId) -> Self {
        Self { rf, channel_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(RfAttributes::new(45.1, 5.7, 0, 851_012_500.0).validate().is_ok());
        assert_eq!(
            RfAttributes::new(45.1, 5.7, -1, 851_012_500.0).validate(),
            Err(ValidationError::Polarization(-1))
        );
        assert_eq!(
            RfAttributes::new(45.1, 5.7, 0, 0.5).validate(),
            Err(ValidationError::Frequency(0.5))
        );
    }

    #[test]
    fn test_follow_request_json_is_flat() {
        let request = FollowRequest::new(
            RfAttributes::new(45.1, 5.7, 0, 851_012_500.0),
            ControlChannelId::new(1, 2, 3, 4),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["frequency"], 851_012_500.0);
        assert_eq!(json["channel_id"]["site_id"], 4);

        let back: FollowRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
