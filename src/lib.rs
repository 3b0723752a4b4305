pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod server;
pub mod status;

pub use app::{ComponentState, ShutdownReason, TvStatusOrchestrator};
pub use config::TvStatusConfig;
pub use error::{GatewayError, Result, TvStatusError};
pub use gateway::{DeviceGateway, DeviceGatewayBuilder, NowPlaying};
pub use server::{ApiServer, ApiState};
pub use status::{resolve_id, PowerState, StatusCache, StatusPoller, StatusRecord};
