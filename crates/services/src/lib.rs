#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod finalizer;
pub mod metronome;
pub mod sessions;

pub use practice_core::Clock;

pub use app_services::AppServices;
pub use error::{ExitError, FinalizeError, PlaybackError};
pub use finalizer::{FinalizeReport, FinalizeRequest, FinalizeWarning, SessionFinalizer};
pub use metronome::{AudioClock, MetronomeScheduler, MetronomeStatus};
pub use sessions::{
    ElapsedTicker, ExitCapabilities, ExitChoice, FinishedSession, PlaybackController,
    SessionEnd, SessionPhase, SessionProgress, SessionRecorder, TickOutcome, UnitTiming,
};
