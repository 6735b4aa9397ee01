use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AudioClockError {
    #[error("audio output could not be resumed: {0}")]
    Resume(String),
}

/// A single click handed to the audio output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    /// Start time on the audio clock, in seconds.
    pub at: f64,
    pub pitch_hz: f64,
    pub duration: Duration,
    /// Linear gain in `[0, 1]`.
    pub amplitude: f32,
}

/// Sample-accurate time source that can play tones at given instants.
///
/// Implementations wrap an audio device; the scheduler only ever talks to
/// this trait.
pub trait AudioClock: Send + Sync {
    /// Seconds on the audio clock's monotonic timeline.
    fn now(&self) -> f64;

    fn is_suspended(&self) -> bool;

    /// # Errors
    ///
    /// Returns `AudioClockError` if the output cannot be brought back.
    fn resume(&self) -> Result<(), AudioClockError>;

    fn schedule_tone(&self, tone: Tone);

    /// Give the underlying output back. No tones are scheduled afterwards.
    fn release(&self);
}

/// Clock backed by `Instant` that logs tones instead of playing them.
///
/// Used by the headless binary; keeps the tones it was given so callers can
/// inspect them.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: Instant,
    released: AtomicBool,
    tones: Mutex<Vec<Tone>>,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            released: AtomicBool::new(false),
            tones: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn tones(&self) -> Vec<Tone> {
        self.tones
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl AudioClock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn is_suspended(&self) -> bool {
        self.is_released()
    }

    fn resume(&self) -> Result<(), AudioClockError> {
        if self.is_released() {
            return Err(AudioClockError::Resume("clock was released".into()));
        }
        Ok(())
    }

    fn schedule_tone(&self, tone: Tone) {
        if self.is_released() {
            return;
        }
        debug!(at = tone.at, pitch_hz = tone.pitch_hz, amplitude = tone.amplitude, "click");
        if let Ok(mut guard) = self.tones.lock() {
            guard.push(tone);
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(at: f64) -> Tone {
        Tone {
            at,
            pitch_hz: 1000.0,
            duration: Duration::from_millis(50),
            amplitude: 0.5,
        }
    }

    #[test]
    fn released_clock_drops_tones_and_cannot_resume() {
        let clock = MonotonicClock::new();
        clock.schedule_tone(tone(0.1));
        clock.release();
        clock.schedule_tone(tone(0.2));

        assert_eq!(clock.tones().len(), 1);
        assert!(clock.is_suspended());
        assert!(clock.resume().is_err());
    }

    #[test]
    fn time_moves_forward() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
