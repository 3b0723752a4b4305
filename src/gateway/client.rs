use super::foreground::{AdbForegroundResolver, ForegroundAppResolver};
use super::remote::ircc_envelope;
use crate::config::DeviceConfig;
use crate::error::{GatewayError, TvStatusError};
use crate::status::{PowerState, VolumeReading};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{IpAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_API_VERSION: &str = "1.0";
const IRCC_SOAP_ACTION: &str = "\"urn:schemas-sony-com:service:IRCC:1#X_SendIRCC\"";

/// Request/response client for the TV's JSON control API and its IRCC endpoint.
///
/// Holds no device state between calls; the only thing shared is the HTTP
/// connection pool.
#[derive(Clone)]
pub struct DeviceGateway {
    client: Client,
    base_url: String,
    psk: String,
    request_timeout: Duration,
    ircc_timeout: Duration,
    pub(super) foreground: Option<Arc<dyn ForegroundAppResolver>>,
}

impl DeviceGateway {
    pub fn builder() -> DeviceGatewayBuilder {
        DeviceGatewayBuilder::default()
    }

    /// Build a gateway for the configured TV, with the adb probe attached if enabled
    pub fn from_config(config: &DeviceConfig) -> Result<Self, TvStatusError> {
        let mut builder = Self::builder()
            .base_url(format!("http://{}", config.host))
            .psk(config.psk.clone())
            .request_timeout(config.request_timeout())
            .ircc_timeout(config.ircc_timeout());

        if config.bind_local_address {
            match local_address_towards(&config.host) {
                Some(addr) => {
                    debug!("Binding device requests to local address {}", addr);
                    builder = builder.local_address(addr);
                }
                None => debug!("No local route to {}, using default interface", config.host),
            }
        }

        if config.adb_enabled {
            builder = builder.foreground_resolver(Arc::new(AdbForegroundResolver::from_config(
                config,
            )));
        }

        builder.build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one JSON command envelope to `/sony/{service}`.
    ///
    /// The device answers HTTP 200 even for application errors, so the body's
    /// `error` member is checked before the payload is handed back.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        params: Vec<Value>,
        version: &str,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/sony/{}", self.base_url, service);
        let envelope = json!({
            "method": method,
            "id": 1,
            "params": params,
            "version": version,
        });

        trace!("POST {} {}", url, envelope);

        let response = self
            .client
            .post(&url)
            .header("X-Auth-PSK", &self.psk)
            .timeout(self.request_timeout)
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await?;
        let payload: Value = serde_json::from_slice(&body)
            .map_err(|e| GatewayError::decode(method, format!("invalid JSON body: {}", e)))?;

        if let Some(error) = payload.get("error") {
            let code = error.get(0).and_then(Value::as_i64).unwrap_or(-1);
            let message = error
                .get(1)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            return Err(GatewayError::Device { code, message });
        }

        Ok(payload)
    }

    /// Send an opaque remote-control code through the IRCC SOAP endpoint
    pub async fn send_ircc(&self, code: &str) -> Result<(), GatewayError> {
        let url = format!("{}/sony/IRCC", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("X-Auth-PSK", &self.psk)
            .header("SOAPACTION", IRCC_SOAP_ACTION)
            .timeout(self.ircc_timeout)
            .body(ircc_envelope(code))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(GatewayError::HttpStatus {
                status: status.as_u16(),
                body: format!("IRCC returned {}", status.as_u16()),
            });
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn power_status(&self) -> Result<PowerState, GatewayError> {
        let payload = self
            .call("system", "getPowerStatus", Vec::new(), DEFAULT_API_VERSION)
            .await?;

        let status = first_result(&payload, "getPowerStatus")?
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::decode("getPowerStatus", "missing status field"))?;

        Ok(PowerState::from_device(status))
    }

    /// Speaker volume and mute state.
    ///
    /// `Ok(None)` means the device answered but listed no speaker target.
    pub async fn volume_information(&self) -> Result<Option<VolumeReading>, GatewayError> {
        let payload = self
            .call("audio", "getVolumeInformation", Vec::new(), DEFAULT_API_VERSION)
            .await?;

        let targets = match first_result(&payload, "getVolumeInformation")?.as_array() {
            Some(targets) => targets,
            None => return Ok(None),
        };

        let reading = targets
            .iter()
            .find(|entry| entry.get("target").and_then(Value::as_str) == Some("speaker"))
            .map(|speaker| {
                VolumeReading::new(
                    speaker.get("volume").and_then(Value::as_u64).unwrap_or(0),
                    speaker.get("mute").and_then(Value::as_bool).unwrap_or(false),
                )
            });

        Ok(reading)
    }

    /// Every external input the device reports, with label and connection state
    pub async fn external_inputs(&self) -> Result<Vec<ExternalInput>, GatewayError> {
        let payload = self
            .call(
                "avContent",
                "getCurrentExternalInputsStatus",
                Vec::new(),
                "1.1",
            )
            .await?;

        let entries: Vec<ExternalInput> = optional_first_result(&payload, "getCurrentExternalInputsStatus")?
            .and_then(Value::as_array)
            .map(|inputs| inputs.iter().filter_map(ExternalInput::from_entry).collect())
            .unwrap_or_default();

        Ok(entries)
    }

    /// External inputs restricted to HDMI ports
    pub async fn hdmi_inputs(&self) -> Result<Vec<ExternalInput>, GatewayError> {
        let mut inputs = self.external_inputs().await?;
        inputs.retain(ExternalInput::is_hdmi);
        Ok(inputs)
    }

    /// User-assigned labels of external inputs, keyed by input uri
    pub async fn hdmi_labels(&self) -> Result<HashMap<String, String>, GatewayError> {
        Ok(self
            .external_inputs()
            .await?
            .into_iter()
            .map(|input| (input.uri, input.label))
            .collect())
    }

    /// Raw `(title, uri)` of the playing content, `None` when the list is empty
    pub async fn playing_content(&self) -> Result<Option<(String, String)>, GatewayError> {
        let payload = self
            .call(
                "avContent",
                "getPlayingContentInfo",
                Vec::new(),
                DEFAULT_API_VERSION,
            )
            .await?;

        Ok(
            optional_first_result(&payload, "getPlayingContentInfo")?.map(|info| {
                let field = |name: &str| {
                    info.get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                (field("title"), field("uri"))
            }),
        )
    }

    pub async fn application_list(&self) -> Result<Value, GatewayError> {
        let payload = self
            .call(
                "appControl",
                "getApplicationList",
                Vec::new(),
                DEFAULT_API_VERSION,
            )
            .await?;
        Ok(optional_first_result(&payload, "getApplicationList")?
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    pub async fn source_list(&self) -> Result<Value, GatewayError> {
        let payload = self
            .call("avContent", "getSourceList", Vec::new(), DEFAULT_API_VERSION)
            .await?;
        Ok(optional_first_result(&payload, "getSourceList")?
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn set_power(&self, on: bool) -> Result<(), GatewayError> {
        self.call(
            "system",
            "setPowerStatus",
            vec![json!({ "status": on })],
            DEFAULT_API_VERSION,
        )
        .await
        .map(drop)
    }

    /// `volume` is either an absolute level ("35") or a step ("+5", "-5")
    pub async fn set_volume(&self, volume: &str) -> Result<(), GatewayError> {
        self.call(
            "audio",
            "setAudioVolume",
            vec![json!({ "target": "speaker", "volume": volume })],
            DEFAULT_API_VERSION,
        )
        .await
        .map(drop)
    }

    pub async fn set_mute(&self, muted: bool) -> Result<(), GatewayError> {
        self.call(
            "audio",
            "setAudioMute",
            vec![json!({ "status": muted })],
            DEFAULT_API_VERSION,
        )
        .await
        .map(drop)
    }

    pub async fn launch_app(&self, uri: &str) -> Result<(), GatewayError> {
        self.call(
            "appControl",
            "setActiveApp",
            vec![json!({ "uri": uri })],
            DEFAULT_API_VERSION,
        )
        .await
        .map(drop)
    }

    pub async fn switch_input(&self, uri: &str) -> Result<(), GatewayError> {
        self.call(
            "avContent",
            "setPlayContent",
            vec![json!({ "uri": uri })],
            DEFAULT_API_VERSION,
        )
        .await
        .map(drop)
    }
}

/// One entry of `getCurrentExternalInputsStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInput {
    pub uri: String,
    pub title: String,
    pub label: String,
    /// The label when the user set one, else the device title
    pub display_name: String,
    pub connected: bool,
}

impl ExternalInput {
    fn from_entry(entry: &Value) -> Option<Self> {
        let field = |name: &str| {
            entry
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let uri = field("uri");
        if uri.is_empty() {
            return None;
        }
        let title = field("title");
        let label = field("label");
        let display_name = if label.is_empty() {
            title.clone()
        } else {
            label.clone()
        };

        Some(Self {
            uri,
            title,
            label,
            display_name,
            connected: entry
                .get("connection")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    pub fn is_hdmi(&self) -> bool {
        self.uri.contains("hdmi")
    }
}

/// `result[0]` of a payload; a missing `result` member is a decode error
fn first_result<'a>(payload: &'a Value, method: &str) -> Result<&'a Value, GatewayError> {
    optional_first_result(payload, method)?
        .ok_or_else(|| GatewayError::decode(method, "empty result list"))
}

/// `result[0]` of a payload, `None` when the result list is empty
fn optional_first_result<'a>(
    payload: &'a Value,
    method: &str,
) -> Result<Option<&'a Value>, GatewayError> {
    let result = payload
        .get("result")
        .ok_or_else(|| GatewayError::decode(method, "missing result member"))?;
    Ok(result.get(0))
}

/// Local interface address that routes towards `host`.
///
/// Connecting a UDP socket sends nothing; it only asks the OS for a route.
fn local_address_towards(host: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect((host, 1)).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}

/// Builder for [`DeviceGateway`]
pub struct DeviceGatewayBuilder {
    base_url: Option<String>,
    psk: String,
    request_timeout: Duration,
    ircc_timeout: Duration,
    local_address: Option<IpAddr>,
    foreground: Option<Arc<dyn ForegroundAppResolver>>,
}

impl Default for DeviceGatewayBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            psk: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ircc_timeout: DEFAULT_REQUEST_TIMEOUT,
            local_address: None,
            foreground: None,
        }
    }
}

impl DeviceGatewayBuilder {
    /// Set the device base URL, e.g. `http://192.168.1.100`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn psk(mut self, psk: impl Into<String>) -> Self {
        self.psk = psk.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn ircc_timeout(mut self, timeout: Duration) -> Self {
        self.ircc_timeout = timeout;
        self
    }

    pub fn local_address(mut self, addr: IpAddr) -> Self {
        self.local_address = Some(addr);
        self
    }

    /// Attach the out-of-band probe used when the API cannot name the content
    pub fn foreground_resolver(mut self, resolver: Arc<dyn ForegroundAppResolver>) -> Self {
        self.foreground = Some(resolver);
        self
    }

    pub fn build(self) -> Result<DeviceGateway, TvStatusError> {
        let base_url = self
            .base_url
            .ok_or_else(|| TvStatusError::component("gateway", "Device base URL is required"))?;

        let client = Client::builder()
            .local_address(self.local_address)
            .build()
            .map_err(|e| TvStatusError::component("gateway".to_string(), e.to_string()))?;

        Ok(DeviceGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            psk: self.psk,
            request_timeout: self.request_timeout,
            ircc_timeout: self.ircc_timeout,
            foreground: self.foreground,
        })
    }
}
