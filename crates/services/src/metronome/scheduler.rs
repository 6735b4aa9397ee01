use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use practice_core::settings::{MAX_BPM, MIN_BPM, MetronomeSettings};

use super::clock::{AudioClock, Tone};

/// Every click plays at this pitch.
pub const CLICK_PITCH_HZ: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetronomeStatus {
    Stopped,
    Running,
    /// The audio output could not be resumed; no ticks are produced.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tempo {
    bpm: u32,
    volume: f32,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    poll_interval: Duration,
    lookahead: Duration,
    click_length: Duration,
}

/// Lookahead metronome.
///
/// A coarse poll loop schedules every tick that falls inside the lookahead
/// window directly on the audio clock, so click timing does not depend on
/// how punctually the poll itself runs.
pub struct MetronomeScheduler {
    clock: Arc<dyn AudioClock>,
    window: Window,
    start_offset: Duration,
    tempo: watch::Sender<Tempo>,
    task: Option<JoinHandle<()>>,
    status: MetronomeStatus,
    released: bool,
}

impl MetronomeScheduler {
    #[must_use]
    pub fn new(clock: Arc<dyn AudioClock>, settings: &MetronomeSettings) -> Self {
        let (tempo, _) = watch::channel(Tempo {
            bpm: settings.bpm().clamp(MIN_BPM, MAX_BPM),
            volume: settings.volume().clamp(0.0, 1.0),
        });
        Self {
            clock,
            window: Window {
                poll_interval: settings.poll_interval(),
                lookahead: settings.lookahead(),
                click_length: settings.click_length(),
            },
            start_offset: settings.start_offset(),
            tempo,
            task: None,
            status: MetronomeStatus::Stopped,
            released: false,
        }
    }

    #[must_use]
    pub fn status(&self) -> MetronomeStatus {
        self.status
    }

    #[must_use]
    pub fn bpm(&self) -> u32 {
        self.tempo.borrow().bpm
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.tempo.borrow().volume
    }

    /// Set the tempo, clamped to the supported range. Takes effect from the
    /// next computed interval. Returns the applied value.
    pub fn set_bpm(&mut self, bpm: u32) -> u32 {
        let bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.tempo.send_modify(|tempo| tempo.bpm = bpm);
        bpm
    }

    /// Step the tempo up or down, e.g. by the +/-5 buttons.
    pub fn adjust_bpm(&mut self, delta: i32) -> u32 {
        let target = i64::from(self.bpm()) + i64::from(delta);
        let clamped = target.clamp(i64::from(MIN_BPM), i64::from(MAX_BPM));
        self.set_bpm(u32::try_from(clamped).unwrap_or(MIN_BPM))
    }

    /// Set the click gain, clamped to `[0, 1]`. Zero silences the clicks but
    /// keeps the tick grid running.
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.tempo.send_modify(|tempo| tempo.volume = volume);
        volume
    }

    /// Begin ticking `start_offset` from now.
    ///
    /// A suspended output is resumed once; if that fails the metronome stays
    /// silent and reports `Unavailable`. Must be called from within a tokio runtime.
    pub fn start(&mut self) -> MetronomeStatus {
        if self.task.is_some() {
            return self.status;
        }
        if self.released {
            self.status = MetronomeStatus::Unavailable;
            return self.status;
        }
        if self.clock.is_suspended() {
            if let Err(err) = self.clock.resume() {
                warn!(%err, "metronome unavailable");
                self.status = MetronomeStatus::Unavailable;
                return self.status;
            }
        }

        let first_tick = self.clock.now() + self.start_offset.as_secs_f64();
        self.task = Some(tokio::spawn(run(
            Arc::clone(&self.clock),
            self.tempo.subscribe(),
            self.window,
            first_tick,
        )));
        self.status = MetronomeStatus::Running;
        info!(bpm = self.bpm(), volume = self.volume(), "metronome started");
        self.status
    }

    /// Stop polling. Tones already handed to the clock still play.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("metronome stopped");
        }
        if self.status == MetronomeStatus::Running {
            self.status = MetronomeStatus::Stopped;
        }
    }

    /// Stop and give the audio clock back.
    pub fn shutdown(&mut self) {
        self.stop();
        if !self.released {
            self.clock.release();
            self.released = true;
        }
    }
}

impl Drop for MetronomeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    clock: Arc<dyn AudioClock>,
    tempo: watch::Receiver<Tempo>,
    window: Window,
    mut next_tick: f64,
) {
    let lookahead = window.lookahead.as_secs_f64();
    let mut poll = tokio::time::interval(window.poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        poll.tick().await;
        let now = clock.now();
        let interval = 60.0 / f64::from(tempo.borrow().bpm);
        let (resume_at, dropped) = skip_missed(next_tick, now, interval);
        if dropped > 0 {
            debug!(dropped, "metronome poll stalled, late ticks dropped");
            next_tick = resume_at;
        }
        let horizon = now + lookahead;
        while next_tick < horizon {
            let Tempo { bpm, volume } = *tempo.borrow();
            if volume > 0.0 {
                clock.schedule_tone(Tone {
                    at: next_tick,
                    pitch_hz: CLICK_PITCH_HZ,
                    duration: window.click_length,
                    amplitude: volume,
                });
            }
            next_tick += 60.0 / f64::from(bpm);
        }
    }
}

/// First grid point at or after `now`, and how many ticks were skipped to reach it.
fn skip_missed(next_tick: f64, now: f64, interval: f64) -> (f64, u64) {
    if next_tick >= now {
        return (next_tick, 0);
    }
    let missed = ((now - next_tick) / interval).ceil();
    (next_tick + missed * interval, missed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metronome::clock::AudioClockError;
    use practice_core::settings::PlayerSettingsDraft;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::time::{Instant, sleep};

    struct FakeClock {
        origin: Instant,
        skew: Mutex<f64>,
        suspended: AtomicBool,
        resume_fails: bool,
        resumes: AtomicUsize,
        released: AtomicBool,
        tones: Mutex<Vec<Tone>>,
    }

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                skew: Mutex::new(0.0),
                suspended: AtomicBool::new(false),
                resume_fails: false,
                resumes: AtomicUsize::new(0),
                released: AtomicBool::new(false),
                tones: Mutex::new(Vec::new()),
            })
        }

        fn suspended(resume_fails: bool) -> Arc<Self> {
            Arc::new(Self {
                origin: Instant::now(),
                skew: Mutex::new(0.0),
                suspended: AtomicBool::new(true),
                resume_fails,
                resumes: AtomicUsize::new(0),
                released: AtomicBool::new(false),
                tones: Mutex::new(Vec::new()),
            })
        }

        /// Jump the audio clock ahead as if the process had been suspended.
        fn stall(&self, secs: f64) {
            *self.skew.lock().unwrap() += secs;
        }

        fn tone_times(&self) -> Vec<f64> {
            self.tones.lock().unwrap().iter().map(|t| t.at).collect()
        }
    }

    impl AudioClock for FakeClock {
        fn now(&self) -> f64 {
            self.origin.elapsed().as_secs_f64() + *self.skew.lock().unwrap()
        }

        fn is_suspended(&self) -> bool {
            self.suspended.load(Ordering::SeqCst)
        }

        fn resume(&self) -> Result<(), AudioClockError> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            if self.resume_fails {
                return Err(AudioClockError::Resume("device busy".into()));
            }
            self.suspended.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn schedule_tone(&self, tone: Tone) {
            self.tones.lock().unwrap().push(tone);
        }

        fn release(&self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn scheduler(clock: &Arc<FakeClock>, bpm: u32, volume: f32) -> MetronomeScheduler {
        let settings = PlayerSettingsDraft {
            bpm: Some(bpm),
            volume: Some(volume),
            ..PlayerSettingsDraft::default()
        }
        .validate()
        .unwrap();
        let clock: Arc<dyn AudioClock> = clock.clone();
        MetronomeScheduler::new(clock, settings.metronome())
    }

    fn assert_times(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-6, "{actual:?} vs {expected:?}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn schedules_ticks_inside_the_lookahead_window() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.5);
        assert_eq!(metronome.start(), MetronomeStatus::Running);

        sleep(Duration::from_millis(500)).await;
        assert_times(&clock.tone_times(), &[0.05]);

        sleep(Duration::from_millis(600)).await;
        assert_times(&clock.tone_times(), &[0.05, 1.05]);

        let tone = clock.tones.lock().unwrap()[0];
        assert_eq!(tone.pitch_hz, CLICK_PITCH_HZ);
        assert_eq!(tone.duration, Duration::from_millis(50));
        assert_eq!(tone.amplitude, 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_volume_keeps_the_grid() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.0);
        metronome.start();

        sleep(Duration::from_millis(600)).await;
        assert!(clock.tone_times().is_empty());

        metronome.set_volume(0.8);
        sleep(Duration::from_millis(500)).await;
        assert_times(&clock.tone_times(), &[1.05]);
    }

    #[tokio::test(start_paused = true)]
    async fn tempo_change_applies_to_the_next_interval() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.5);
        metronome.start();

        sleep(Duration::from_millis(100)).await;
        assert_eq!(metronome.set_bpm(120), 120);

        sleep(Duration::from_millis(1000)).await;
        assert_times(&clock.tone_times(), &[0.05, 1.05]);

        sleep(Duration::from_millis(500)).await;
        assert_times(&clock.tone_times(), &[0.05, 1.05, 1.55]);
    }

    #[tokio::test(start_paused = true)]
    async fn stall_drops_late_ticks_instead_of_bursting() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.5);
        metronome.start();
        sleep(Duration::from_millis(200)).await;
        assert_times(&clock.tone_times(), &[0.05]);

        clock.stall(3.0);
        sleep(Duration::from_millis(100)).await;
        assert_times(&clock.tone_times(), &[0.05]);

        sleep(Duration::from_millis(700)).await;
        assert_times(&clock.tone_times(), &[0.05, 4.05]);
    }

    #[test]
    fn skipping_lands_on_the_grid() {
        assert_eq!(skip_missed(5.0, 4.0, 0.5), (5.0, 0));
        let (at, dropped) = skip_missed(1.05, 3.2, 1.0);
        assert!((at - 4.05).abs() < 1e-9);
        assert_eq!(dropped, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_resume_reports_unavailable() {
        let clock = FakeClock::suspended(true);
        let mut metronome = scheduler(&clock, 60, 0.5);

        assert_eq!(metronome.start(), MetronomeStatus::Unavailable);
        sleep(Duration::from_millis(500)).await;
        assert!(clock.tone_times().is_empty());
        assert_eq!(clock.resumes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn suspended_clock_is_resumed_before_ticking() {
        let clock = FakeClock::suspended(false);
        let mut metronome = scheduler(&clock, 60, 0.5);

        assert_eq!(metronome.start(), MetronomeStatus::Running);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(clock.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(clock.tone_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_keeps_the_clock_and_shutdown_releases_it() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.5);
        metronome.start();
        sleep(Duration::from_millis(200)).await;

        metronome.stop();
        assert_eq!(metronome.status(), MetronomeStatus::Stopped);
        assert!(!clock.released.load(Ordering::SeqCst));

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(clock.tone_times().len(), 1, "no ticks after stop");

        metronome.shutdown();
        assert!(clock.released.load(Ordering::SeqCst));
        assert_eq!(metronome.start(), MetronomeStatus::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_releases_the_clock() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 60, 0.5);
        metronome.start();
        drop(metronome);
        assert!(clock.released.load(Ordering::SeqCst));
    }

    #[test]
    fn bpm_steps_are_clamped() {
        let clock = FakeClock::new();
        let mut metronome = scheduler(&clock, 295, 0.5);
        assert_eq!(metronome.adjust_bpm(5), 300);
        assert_eq!(metronome.adjust_bpm(5), 300);
        assert_eq!(metronome.set_bpm(10), 30);
        assert_eq!(metronome.adjust_bpm(-5), 30);
        assert_eq!(metronome.adjust_bpm(15), 45);
    }
}
