use crate::config::DeviceConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Out-of-band lookup of the package currently in the foreground.
///
/// Used only when the control API cannot name what is playing. Implementations
/// are best-effort: `Ok(None)` means the probe ran but found nothing.
#[async_trait]
pub trait ForegroundAppResolver: Send + Sync {
    async fn foreground_package(&self) -> Result<Option<String>, GatewayError>;

    fn resolver_name(&self) -> &str;
}

/// Asks the TV's adb daemon which window has focus
pub struct AdbForegroundResolver {
    adb_path: String,
    target: String,
    connect_timeout: Duration,
    probe_timeout: Duration,
}

impl AdbForegroundResolver {
    pub fn new(target: impl Into<String>, connect_timeout: Duration, probe_timeout: Duration) -> Self {
        Self {
            adb_path: "adb".to_string(),
            target: target.into(),
            connect_timeout,
            probe_timeout,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            config.adb_target(),
            Duration::from_millis(config.adb_connect_timeout_ms),
            Duration::from_millis(config.adb_probe_timeout_ms),
        )
    }

    /// Use a specific adb binary instead of the one on `PATH`
    pub fn with_adb_path(mut self, adb_path: impl Into<String>) -> Self {
        self.adb_path = adb_path.into();
        self
    }

    async fn run(&self, args: &[&str], limit: Duration) -> Result<Output, GatewayError> {
        let mut command = Command::new(&self.adb_path);
        command.args(args).kill_on_drop(true);

        match timeout(limit, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(GatewayError::Probe(format!(
                "failed to run {} {}: {}",
                self.adb_path,
                args.join(" "),
                e
            ))),
            Err(_) => Err(GatewayError::Probe(format!(
                "{} {} timed out after {:?}",
                self.adb_path,
                args.join(" "),
                limit
            ))),
        }
    }
}

#[async_trait]
impl ForegroundAppResolver for AdbForegroundResolver {
    async fn foreground_package(&self) -> Result<Option<String>, GatewayError> {
        // An already-connected device makes this a no-op; failures surface in the probe
        if let Err(e) = self
            .run(&["connect", &self.target], self.connect_timeout)
            .await
        {
            debug!("adb connect to {} failed: {}", self.target, e);
        }

        let output = self
            .run(
                &["-s", &self.target, "shell", "dumpsys", "window", "windows"],
                self.probe_timeout,
            )
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_focused_package(&stdout))
    }

    fn resolver_name(&self) -> &str {
        "adb"
    }
}

/// Extract the focused package from `dumpsys window windows` output.
///
/// `mCurrentFocus=Window{3c1 u0 com.netflix.ninja/com.netflix.ninja.MainActivity}`
/// yields `com.netflix.ninja`.
pub fn parse_focused_package(dump: &str) -> Option<String> {
    let line = dump
        .lines()
        .find(|line| line.to_lowercase().contains("mcurrentfocus"))?;

    let (_, after_user) = line.rsplit_once("u0 ")?;
    let package = after_user
        .split('/')
        .next()
        .unwrap_or_default()
        .trim()
        .replace('}', "");

    if package.is_empty() {
        None
    } else {
        Some(package)
    }
}
