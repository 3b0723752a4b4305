use super::content_id::resolve_id;
use super::record::{ErrorCounters, PowerState, StatusRecord, VolumeReading};
use super::source::StatusSource;
use crate::config::StatusConfig;
use crate::error::GatewayError;
use crate::gateway::NowPlaying;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of one scheduled poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// All three signals were fetched and committed
    Refreshed,
    /// Skipped because a manual override is still inside its cool-down
    Suppressed,
}

struct CacheState {
    record: StatusRecord,
    counters: ErrorCounters,
    last_override: Option<Instant>,
    last_cycle: Option<DateTime<Utc>>,
}

/// Readings gathered outside the lock, committed in one critical section
struct SignalReadings {
    power: Result<PowerState, GatewayError>,
    volume: Result<Option<VolumeReading>, GatewayError>,
    now_playing: NowPlaying,
}

/// Shared, lock-protected device status.
///
/// Record, error counters and override bookkeeping live behind one mutex. Network
/// I/O never happens while it is held: [`poll`](Self::poll) fetches first and
/// then locks once to commit.
pub struct StatusCache {
    state: Mutex<CacheState>,
    max_error_iterations: u32,
    override_cooldown: Duration,
}

impl StatusCache {
    pub fn new(config: &StatusConfig) -> Self {
        Self::with_policy(config.max_error_iterations, config.override_cooldown())
    }

    pub fn with_policy(max_error_iterations: u32, override_cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(CacheState {
                record: StatusRecord::default(),
                counters: ErrorCounters::default(),
                last_override: None,
                last_cycle: None,
            }),
            max_error_iterations,
            override_cooldown,
        }
    }

    /// Copy of the current record
    pub fn get_status(&self) -> StatusRecord {
        self.state.lock().record.clone()
    }

    pub fn error_counters(&self) -> ErrorCounters {
        self.state.lock().counters
    }

    /// Wall-clock time of the last committed poll
    pub fn last_cycle(&self) -> Option<DateTime<Utc>> {
        self.state.lock().last_cycle
    }

    /// Record what a foreground command just put on screen.
    ///
    /// Polling is suppressed for the cool-down window so a device that has
    /// not caught up yet cannot overwrite this.
    pub fn update_override(&self, title: &str, uri: &str) -> StatusRecord {
        let now_playing_id = resolve_id(title);
        let mut state = self.state.lock();

        state.record.title = title.to_string();
        state.record.uri = uri.to_string();
        state.record.now_playing_id = now_playing_id;
        state.record.timestamp = Some(Utc::now());
        state.counters.now_playing = 0;
        state.last_override = Some(Instant::now());

        info!(
            "Status override: title={:?} uri={:?} id={}",
            title, uri, now_playing_id
        );

        state.record.clone()
    }

    /// Whether a recent override is still suppressing polls
    pub fn is_suppressed(&self) -> bool {
        let state = self.state.lock();
        state
            .last_override
            .is_some_and(|at| at.elapsed() < self.override_cooldown)
    }

    /// Run one reconciliation cycle against `source`
    pub async fn poll(&self, source: &dyn StatusSource) -> PollOutcome {
        if self.is_suppressed() {
            info!("Skipping background poll due to recent manual override");
            return PollOutcome::Suppressed;
        }

        let started = Instant::now();
        let readings = SignalReadings {
            power: source.power_status().await,
            volume: source.volume_information().await,
            now_playing: source.now_playing().await,
        };

        let record = self.commit(started, readings);

        match serde_json::to_string(&record) {
            Ok(json) => info!("Current status: {}", json),
            Err(e) => warn!("Could not serialize status for logging: {}", e),
        }

        PollOutcome::Refreshed
    }

    fn commit(&self, started: Instant, readings: SignalReadings) -> StatusRecord {
        let threshold = self.max_error_iterations;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        match readings.power {
            Ok(power) => {
                debug!("Power: {}", power);
                state.record.power = power;
                state.counters.power = 0;
            }
            Err(e) => {
                state.counters.power = state.counters.power.saturating_add(1);
                warn!(
                    "Power read failed ({}/{}): {}",
                    state.counters.power, threshold, e
                );
                if state.counters.power > threshold {
                    state.record.power = PowerState::Offline;
                }
            }
        }

        match readings.volume {
            Ok(Some(reading)) => {
                debug!("Volume: {} muted={}", reading.volume, reading.muted);
                state.record.volume = reading.volume;
                state.record.muted = reading.muted;
                state.counters.volume = 0;
            }
            Ok(None) => {
                debug!("Volume answer had no speaker entry");
                state.counters.volume = 0;
            }
            Err(e) => {
                // Volume has no failure sentinel; the last good reading stays
                state.counters.volume = state.counters.volume.saturating_add(1);
                warn!(
                    "Volume read failed ({} consecutive): {}",
                    state.counters.volume, e
                );
            }
        }

        let overridden_mid_cycle = state.last_override.is_some_and(|at| at >= started);
        if overridden_mid_cycle {
            debug!("Override landed during this poll, keeping override's now-playing");
        } else if readings.now_playing.is_known() {
            let NowPlaying { title, uri } = readings.now_playing;
            debug!("Now playing: {} ({})", title, uri);
            state.record.now_playing_id = resolve_id(&title);
            state.record.title = title;
            state.record.uri = uri;
            state.counters.now_playing = 0;
        } else {
            state.counters.now_playing = state.counters.now_playing.saturating_add(1);
            warn!(
                "Now-playing unresolved ({}/{})",
                state.counters.now_playing, threshold
            );
            if state.counters.now_playing > threshold {
                let unknown = NowPlaying::unknown();
                state.record.now_playing_id = resolve_id(&unknown.title);
                state.record.title = unknown.title;
                state.record.uri = unknown.uri;
            }
        }

        let now = Utc::now();
        state.record.timestamp = Some(now);
        state.last_cycle = Some(now);

        state.record.clone()
    }
}
