use thiserror::Error;

/// Failure of a single request to the TV.
///
/// The status loop never surfaces these to readers; they only drive the
/// per-signal error counters. Command endpoints forward the message text.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("device error {code}: {message}")]
    Device { code: i64, message: String },

    #[error("unexpected response from {method}: {details}")]
    Decode { method: String, details: String },

    #[error("foreground probe failed: {0}")]
    Probe(String),
}

impl GatewayError {
    pub fn decode<M: Into<String>, D: Into<String>>(method: M, details: D) -> Self {
        Self::Decode {
            method: method.into(),
            details: details.into(),
        }
    }

    /// The device could not be reached or did not answer with HTTP 200.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::HttpStatus { .. })
    }

    /// The device answered but reported an application-level error.
    pub fn is_device(&self) -> bool {
        matches!(self, Self::Device { .. })
    }
}

#[derive(Error, Debug)]
pub enum TvStatusError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl TvStatusError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TvStatusError>;
