use super::*;
use crate::error::GatewayError;
use crate::gateway::NowPlaying;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted source: `None` in a slot means that signal fails
struct MockSource {
    power: Mutex<Option<PowerState>>,
    volume: Mutex<Option<VolumeReading>>,
    now_playing: Mutex<NowPlaying>,
    calls: AtomicUsize,
    delay: Duration,
}

impl MockSource {
    fn new() -> Self {
        Self {
            power: Mutex::new(Some(PowerState::Active)),
            volume: Mutex::new(Some(VolumeReading::new(25, false))),
            now_playing: Mutex::new(NowPlaying::new("Netflix", "com.netflix.ninja")),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn set_power(&self, power: Option<PowerState>) {
        *self.power.lock() = power;
    }

    fn set_volume(&self, volume: Option<VolumeReading>) {
        *self.volume.lock() = volume;
    }

    fn set_now_playing(&self, now_playing: NowPlaying) {
        *self.now_playing.lock() = now_playing;
    }

    fn fail_all(&self) {
        self.set_power(None);
        self.set_volume(None);
        self.set_now_playing(NowPlaying::unknown());
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn timeout_error() -> GatewayError {
    GatewayError::HttpStatus {
        status: 504,
        body: "gateway timeout".to_string(),
    }
}

#[async_trait]
impl StatusSource for MockSource {
    async fn power_status(&self) -> Result<PowerState, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let power = *self.power.lock();
        power.ok_or_else(timeout_error)
    }

    async fn volume_information(&self) -> Result<Option<VolumeReading>, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let volume = *self.volume.lock();
        volume.map(Some).ok_or_else(timeout_error)
    }

    async fn now_playing(&self) -> NowPlaying {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.now_playing.lock().clone()
    }
}

/// Source whose now-playing read lets a foreground override land mid-cycle
struct RacingSource {
    cache: Arc<StatusCache>,
}

#[async_trait]
impl StatusSource for RacingSource {
    async fn power_status(&self) -> Result<PowerState, GatewayError> {
        Ok(PowerState::Active)
    }

    async fn volume_information(&self) -> Result<Option<VolumeReading>, GatewayError> {
        Ok(Some(VolumeReading::new(40, true)))
    }

    async fn now_playing(&self) -> NowPlaying {
        self.cache.update_override("Spotify", "uri:x");
        NowPlaying::new("Home Screen", "com.google.android.tvlauncher")
    }
}

fn test_cache() -> StatusCache {
    StatusCache::with_policy(3, Duration::from_secs(5))
}

#[tokio::test]
async fn test_successful_poll_writes_all_signals() {
    let cache = test_cache();
    let source = MockSource::new();

    assert_eq!(cache.poll(&source).await, PollOutcome::Refreshed);

    let status = cache.get_status();
    assert_eq!(status.power, PowerState::Active);
    assert_eq!(status.volume, 25);
    assert!(!status.muted);
    assert_eq!(status.title, "Netflix");
    assert_eq!(status.uri, "com.netflix.ninja");
    assert_eq!(status.now_playing_id, 100);
    assert!(status.timestamp.is_some());
    assert_eq!(cache.error_counters(), ErrorCounters::default());
    assert!(cache.last_cycle().is_some());
}

#[tokio::test]
async fn test_power_retained_within_grace_period() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_power(Some(PowerState::Standby));
    cache.poll(&source).await;

    source.set_power(None);
    for failures in 1..=3 {
        cache.poll(&source).await;
        assert_eq!(cache.get_status().power, PowerState::Standby);
        assert_eq!(cache.error_counters().power, failures);
    }
}

#[tokio::test]
async fn test_power_goes_offline_after_threshold_exceeded() {
    let cache = test_cache();
    let source = MockSource::new();
    cache.poll(&source).await;

    source.set_power(None);
    for _ in 0..4 {
        cache.poll(&source).await;
    }

    assert_eq!(cache.get_status().power, PowerState::Offline);
    assert_eq!(cache.error_counters().power, 4);

    // One success clears both the sentinel and the counter
    source.set_power(Some(PowerState::Active));
    cache.poll(&source).await;
    assert_eq!(cache.get_status().power, PowerState::Active);
    assert_eq!(cache.error_counters().power, 0);
}

#[tokio::test]
async fn test_volume_never_reset_on_failure() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_volume(Some(VolumeReading::new(42, true)));
    cache.poll(&source).await;

    source.set_volume(None);
    for _ in 0..20 {
        cache.poll(&source).await;
        let status = cache.get_status();
        assert_eq!(status.volume, 42);
        assert!(status.muted);
    }
    assert_eq!(cache.error_counters().volume, 20);
}

#[tokio::test]
async fn test_now_playing_grace_then_unknown() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_now_playing(NowPlaying::new("PS5", "extInput:hdmi?port=1"));
    cache.poll(&source).await;
    assert_eq!(cache.get_status().now_playing_id, 10);

    source.set_now_playing(NowPlaying::unknown());
    for _ in 0..3 {
        cache.poll(&source).await;
        assert_eq!(cache.get_status().title, "PS5");
    }

    cache.poll(&source).await;
    let status = cache.get_status();
    assert_eq!(status.title, "Unknown");
    assert!(status.uri.is_empty());
    assert_eq!(status.now_playing_id, 0);
}

#[tokio::test]
async fn test_uri_alone_counts_as_now_playing_success() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_now_playing(NowPlaying::new("Unknown", "com.example.app"));

    cache.poll(&source).await;

    assert_eq!(cache.get_status().uri, "com.example.app");
    assert_eq!(cache.error_counters().now_playing, 0);
}

#[tokio::test]
async fn test_signals_fail_independently() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_power(None);

    cache.poll(&source).await;

    let counters = cache.error_counters();
    assert_eq!(counters.power, 1);
    assert_eq!(counters.volume, 0);
    assert_eq!(counters.now_playing, 0);
    assert_eq!(cache.get_status().volume, 25);
}

#[tokio::test]
async fn test_override_is_visible_immediately() {
    let cache = Arc::new(test_cache());
    let source = MockSource::new();
    source.set_now_playing(NowPlaying::unknown());
    cache.poll(&source).await;
    assert_eq!(cache.error_counters().now_playing, 1);

    cache.update_override("Spotify", "uri:x");

    let reader = Arc::clone(&cache);
    let status = tokio::spawn(async move { reader.get_status() })
        .await
        .unwrap();
    assert_eq!(status.title, "Spotify");
    assert_eq!(status.uri, "uri:x");
    assert_eq!(status.now_playing_id, 106);
    assert_eq!(cache.error_counters().now_playing, 0);
}

#[tokio::test(start_paused = true)]
async fn test_poll_suppressed_within_cooldown() {
    let cache = test_cache();
    let source = MockSource::new();
    source.set_power(Some(PowerState::Standby));
    cache.poll(&source).await;
    let calls_before = source.calls();

    cache.update_override("YouTube", "com.google.android.youtube.tv");
    let overridden = cache.get_status();

    source.set_power(Some(PowerState::Active));
    source.set_volume(Some(VolumeReading::new(80, true)));
    source.set_now_playing(NowPlaying::new("Netflix", "com.netflix.ninja"));

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(cache.poll(&source).await, PollOutcome::Suppressed);

    assert_eq!(cache.get_status(), overridden);
    assert_eq!(source.calls(), calls_before);
}

#[tokio::test(start_paused = true)]
async fn test_polling_resumes_after_cooldown() {
    let cache = test_cache();
    let source = MockSource::new();

    cache.update_override("YouTube", "com.google.android.youtube.tv");
    assert!(cache.is_suppressed());

    tokio::time::advance(Duration::from_secs(5)).await;
    assert!(!cache.is_suppressed());
    assert_eq!(cache.poll(&source).await, PollOutcome::Refreshed);
    assert_eq!(cache.get_status().title, "Netflix");
}

#[tokio::test]
async fn test_override_during_poll_is_not_clobbered() {
    let cache = Arc::new(test_cache());
    let source = RacingSource {
        cache: Arc::clone(&cache),
    };

    assert_eq!(cache.poll(&source).await, PollOutcome::Refreshed);

    let status = cache.get_status();
    assert_eq!(status.title, "Spotify");
    assert_eq!(status.uri, "uri:x");
    assert_eq!(status.now_playing_id, 106);
    // Power and volume from the same cycle still land
    assert_eq!(status.power, PowerState::Active);
    assert_eq!(status.volume, 40);
    assert!(status.muted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_see_partial_commit() {
    let cache = Arc::new(StatusCache::with_policy(3, Duration::ZERO));
    let source = Arc::new(MockSource::new());

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                for _ in 0..2_000 {
                    let status = cache.get_status();
                    let consistent = match status.title.as_str() {
                        "Unknown" => status.timestamp.is_none(),
                        "Netflix" => {
                            status.power == PowerState::Active
                                && status.volume == 10
                                && status.now_playing_id == 100
                        }
                        "YouTube" => {
                            status.power == PowerState::Standby
                                && status.volume == 20
                                && status.now_playing_id == 101
                        }
                        _ => false,
                    };
                    assert!(consistent, "torn snapshot: {:?}", status);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    for round in 0..200 {
        if round % 2 == 0 {
            source.set_power(Some(PowerState::Active));
            source.set_volume(Some(VolumeReading::new(10, false)));
            source.set_now_playing(NowPlaying::new("Netflix", "com.netflix.ninja"));
        } else {
            source.set_power(Some(PowerState::Standby));
            source.set_volume(Some(VolumeReading::new(20, false)));
            source.set_now_playing(NowPlaying::new("YouTube", "com.google.android.youtube.tv"));
        }
        cache.poll(source.as_ref()).await;
    }

    for reader in readers {
        reader.await.unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_read_does_not_wait_on_slow_device() {
    let cache = Arc::new(test_cache());
    let source = Arc::new(MockSource::new().with_delay(Duration::from_millis(500)));

    let poll_cache = Arc::clone(&cache);
    let poll_source = Arc::clone(&source);
    let poll = tokio::spawn(async move { poll_cache.poll(poll_source.as_ref()).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let started = std::time::Instant::now();
    let status = cache.get_status();
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(status.title, "Unknown");

    poll.await.unwrap();
    assert_eq!(cache.get_status().title, "Netflix");
}

#[tokio::test(start_paused = true)]
async fn test_poller_runs_on_interval_and_stops() {
    let cache = Arc::new(test_cache());
    let source = Arc::new(MockSource::new());
    let poller = StatusPoller::new(
        Arc::clone(&cache),
        Arc::clone(&source) as Arc<dyn StatusSource>,
        Duration::from_secs(10),
    );

    assert!(!poller.liveness().running);
    poller.start().unwrap();
    assert!(poller.start().is_err());

    // First tick fires immediately
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(source.calls(), 3);
    assert!(poller.is_running());
    assert!(poller.liveness().last_cycle.is_some());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(source.calls(), 6);

    poller.stop().await.unwrap();
    assert!(!poller.is_running());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(source.calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_poller_survives_failing_device() {
    let cache = Arc::new(test_cache());
    let source = Arc::new(MockSource::new());
    source.fail_all();
    let poller = StatusPoller::new(
        Arc::clone(&cache),
        Arc::clone(&source) as Arc<dyn StatusSource>,
        Duration::from_secs(1),
    );

    poller.start().unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    assert!(poller.is_running());
    let counters = cache.error_counters();
    assert_eq!(counters.power, 6);
    assert_eq!(cache.get_status().power, PowerState::Offline);

    poller.stop().await.unwrap();
}
