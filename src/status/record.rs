use crate::gateway::NowPlaying;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Power state as reported by the TV, plus the two states the cache assigns itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Active,
    Standby,
    /// Assigned after too many consecutive failed power reads
    Offline,
    /// Nothing read yet, or the device sent a state we don't know
    Unknown,
}

impl PowerState {
    pub fn from_device(status: &str) -> Self {
        match status {
            "active" => PowerState::Active,
            "standby" => PowerState::Standby,
            "offline" => PowerState::Offline,
            _ => PowerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerState::Active => "active",
            PowerState::Standby => "standby",
            PowerState::Offline => "offline",
            PowerState::Unknown => "unknown",
        }
    }

    /// Gauge value exported on /metrics
    pub fn metric_value(&self) -> f64 {
        match self {
            PowerState::Active => 1.0,
            PowerState::Standby => 0.5,
            PowerState::Offline | PowerState::Unknown => 0.0,
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker volume and mute flag from one successful read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeReading {
    pub volume: u8,
    pub muted: bool,
}

impl VolumeReading {
    pub fn new(volume: u64, muted: bool) -> Self {
        Self {
            volume: volume.min(100) as u8,
            muted,
        }
    }
}

/// Snapshot of everything known about the TV.
///
/// Readers always get a whole copy taken under the cache lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub power: PowerState,
    pub volume: u8,
    pub muted: bool,
    pub title: String,
    pub uri: String,
    pub now_playing_id: i64,
    pub timestamp: Option<DateTime<Utc>>,
}

impl StatusRecord {
    pub fn now_playing(&self) -> NowPlaying {
        NowPlaying::new(self.title.clone(), self.uri.clone())
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        let unknown = NowPlaying::unknown();
        Self {
            power: PowerState::Unknown,
            volume: 0,
            muted: false,
            title: unknown.title,
            uri: unknown.uri,
            now_playing_id: 0,
            timestamp: None,
        }
    }
}

/// Consecutive failures per signal; zeroed by any successful read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCounters {
    pub power: u32,
    pub volume: u32,
    pub now_playing: u32,
}
