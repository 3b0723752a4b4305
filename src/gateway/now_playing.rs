use super::client::DeviceGateway;
use super::names::{friendly_input_name, resolve_app_name};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const UNKNOWN_TITLE: &str = "Unknown";

/// What the TV reports as currently on screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub uri: String,
}

impl NowPlaying {
    pub fn new(title: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            uri: uri.into(),
        }
    }

    /// The "nothing could be determined" sentinel
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_TITLE, "")
    }

    /// A reading counts as successful when it names something or carries a uri
    pub fn is_known(&self) -> bool {
        self.title != UNKNOWN_TITLE || !self.uri.is_empty()
    }
}

impl DeviceGateway {
    /// Resolve the human-readable name of the playing content.
    ///
    /// Order: structured playing-content query (inputs labelled by the user
    /// win over generic names), then the foreground-app probe, then
    /// [`NowPlaying::unknown`]. Never fails.
    pub async fn now_playing(&self) -> NowPlaying {
        match self.playing_content().await {
            Ok(Some((title, uri))) => {
                if let Some(resolved) = self.name_playing_content(title, uri).await {
                    return resolved;
                }
            }
            Ok(None) => debug!("Device reports no playing content"),
            Err(e) => debug!("getPlayingContentInfo failed: {}", e),
        }

        let Some(resolver) = &self.foreground else {
            return NowPlaying::unknown();
        };

        match resolver.foreground_package().await {
            Ok(Some(package)) => NowPlaying::new(resolve_app_name(&package), package),
            Ok(None) => {
                debug!("{} probe found no focused app", resolver.resolver_name());
                NowPlaying::unknown()
            }
            Err(e) => {
                debug!("{} probe failed: {}", resolver.resolver_name(), e);
                NowPlaying::unknown()
            }
        }
    }

    async fn name_playing_content(&self, mut title: String, uri: String) -> Option<NowPlaying> {
        if uri.contains("hdmi") {
            let label = match self.hdmi_labels().await {
                Ok(mut labels) => labels.remove(&uri).filter(|label| !label.is_empty()),
                Err(e) => {
                    debug!("HDMI label lookup failed: {}", e);
                    None
                }
            };
            title = label
                .or_else(|| friendly_input_name(&uri))
                .unwrap_or_else(|| uri.clone());
        }

        if title.is_empty() && !uri.is_empty() {
            title = friendly_input_name(&uri).unwrap_or_else(|| uri.clone());
        }

        if title.is_empty() {
            None
        } else {
            Some(NowPlaying::new(title, uri))
        }
    }
}
