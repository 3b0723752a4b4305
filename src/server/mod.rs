mod handlers;
mod server;

pub use handlers::{ContentRequest, PowerRequest, RemoteRequest, VolumeRequest};
pub use server::{ApiServer, ApiState};
