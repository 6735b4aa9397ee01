mod controller;
pub mod exit;
mod progress;
mod recorder;
mod snapshot;
mod state;
pub mod ticker;

// Public API of the session subsystem.
pub use crate::error::{ExitError, PlaybackError};
pub use controller::{FinishedSession, PlaybackController, SessionEnd, SessionPhase, TickOutcome};
pub use exit::{ExitCapabilities, ExitChoice, ExitFlow};
pub use progress::{SessionProgress, UnitTiming};
pub use recorder::{PROGRESS_HEARTBEAT, SessionRecorder, progress_heartbeat};
pub use snapshot::ResumeSnapshot;
pub use state::PlaybackState;
pub use ticker::{ElapsedTick, ElapsedTicker};
