//! Audio metronome driven by a lookahead scheduler.

mod clock;
mod scheduler;

pub use clock::{AudioClock, AudioClockError, MonotonicClock, Tone};
pub use scheduler::{CLICK_PITCH_HZ, MetronomeScheduler, MetronomeStatus};
