//! Stateless request layer in front of the TV's control API.
//!
//! Every call issues exactly one outbound request with a fixed timeout. There
//! is no retry; failures go straight back to the caller as [`GatewayError`].
//!
//! [`GatewayError`]: crate::error::GatewayError

mod client;
mod foreground;
mod names;
mod now_playing;
mod remote;

pub use client::{DeviceGateway, DeviceGatewayBuilder, ExternalInput};
pub use foreground::{parse_focused_package, AdbForegroundResolver, ForegroundAppResolver};
pub use names::{friendly_input_name, resolve_app_name};
pub use now_playing::NowPlaying;
pub use remote::{ircc_code, ircc_envelope, REMOTE_KEYS};
