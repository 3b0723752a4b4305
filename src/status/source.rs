use super::record::{PowerState, VolumeReading};
use crate::error::GatewayError;
use crate::gateway::{DeviceGateway, NowPlaying};
use async_trait::async_trait;

/// The three signals the status loop polls.
///
/// Implemented by [`DeviceGateway`]; tests substitute scripted sources.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn power_status(&self) -> Result<PowerState, GatewayError>;

    /// `Ok(None)` when the device answered without a speaker reading
    async fn volume_information(&self) -> Result<Option<VolumeReading>, GatewayError>;

    /// Never fails; an unresolvable reading is [`NowPlaying::unknown`]
    async fn now_playing(&self) -> NowPlaying;
}

#[async_trait]
impl StatusSource for DeviceGateway {
    async fn power_status(&self) -> Result<PowerState, GatewayError> {
        DeviceGateway::power_status(self).await
    }

    async fn volume_information(&self) -> Result<Option<VolumeReading>, GatewayError> {
        DeviceGateway::volume_information(self).await
    }

    async fn now_playing(&self) -> NowPlaying {
        DeviceGateway::now_playing(self).await
    }
}
