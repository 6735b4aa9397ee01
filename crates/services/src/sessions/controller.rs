use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use practice_core::Clock;
use practice_core::duration::playback_duration;
use practice_core::model::{PlaybackUnit, SessionTally, SessionTemplate, UnitRecord};
use practice_core::sequence::{expand_steps, sequence_for};
use practice_core::settings::PlayerSettings;
use practice_core::shuffle::{RandomSource, ThreadRandom};
use storage::{EntityKind, EntityStore, StoredRecord, UploadContext};

use super::exit::{ExitCapabilities, ExitChoice, ExitFlow};
use super::progress::{SessionProgress, UnitTiming};
use super::snapshot::ResumeSnapshot;
use super::state::PlaybackState;
use crate::error::{ExitError, PlaybackError};

//
// ─── PHASES ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NotStarted,
    InProgress,
    /// Confirm-exit overlay is open on top of a running session.
    ConfirmExit,
    Finished,
}

/// How a session reached `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The student asked to finish.
    Completed,
    /// Elapsed time reached the session limit.
    TimeLimit,
    SavedForLater,
    Discarded,
}

impl SessionEnd {
    /// Whether the session goes on to be rated and summarized.
    #[must_use]
    pub fn produces_summary(self) -> bool {
        matches!(self, SessionEnd::Completed | SessionEnd::TimeLimit)
    }
}

/// Result of feeding elapsed time into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Running,
    /// The session just finished on its own.
    TimeLimitReached,
    /// Not running; the tick was ignored.
    Idle,
}

//
// ─── FINISHED SESSION ──────────────────────────────────────────────────────────
//

/// Terminal snapshot handed to the finalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedSession {
    pub template_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub end: SessionEnd,
    pub total_units: usize,
    pub completed: usize,
    pub omitted: usize,
    pub pending: usize,
    pub elapsed_secs: u64,
    pub planned_secs: u64,
    pub records: Vec<UnitRecord>,
}

impl FinishedSession {
    #[must_use]
    pub fn tally(&self) -> SessionTally {
        SessionTally {
            total_units: self.total_units,
            completed: self.completed,
            omitted: self.omitted,
            elapsed_secs: self.elapsed_secs,
            planned_secs: self.planned_secs,
        }
    }
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Drives one student through a session template.
///
/// The controller is the single owner of the playback state: completion,
/// omission and navigation happen through `&mut self` and never advance the
/// cursor on their own. Elapsed time is pushed in from outside via [`tick`].
///
/// [`tick`]: PlaybackController::tick
pub struct PlaybackController {
    template: SessionTemplate,
    max_session_secs: u64,
    clock: Clock,
    rng: Box<dyn RandomSource + Send>,
    exit: ExitFlow,
    phase: SessionPhase,
    state: PlaybackState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    end: Option<SessionEnd>,
}

impl PlaybackController {
    #[must_use]
    pub fn new(template: SessionTemplate, settings: &PlayerSettings) -> Self {
        Self {
            template,
            max_session_secs: settings.max_session_secs(),
            clock: Clock::default(),
            rng: Box::new(ThreadRandom),
            exit: ExitFlow::default(),
            phase: SessionPhase::NotStarted,
            state: PlaybackState::default(),
            started_at: None,
            finished_at: None,
            end: None,
        }
    }

    /// Rebuild a running session from saved progress.
    ///
    /// The stored units are used as they are; shuffled rounds keep the order
    /// they had when the snapshot was taken.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::InvalidSnapshot` if the snapshot belongs to a
    /// different template or its indices are inconsistent.
    pub fn resume_from(
        template: SessionTemplate,
        snapshot: ResumeSnapshot,
        settings: &PlayerSettings,
    ) -> Result<Self, PlaybackError> {
        if snapshot.template_name != template.name() {
            return Err(PlaybackError::InvalidSnapshot(format!(
                "snapshot is for `{}`, not `{}`",
                snapshot.template_name,
                template.name()
            )));
        }
        snapshot.state.validate().map_err(PlaybackError::InvalidSnapshot)?;

        let mut controller = Self::new(template, settings);
        controller.state = snapshot.state;
        controller.phase = SessionPhase::InProgress;
        controller.started_at = Some(snapshot.started_at);
        info!(
            template = controller.template.name(),
            current = controller.state.current_index(),
            elapsed_secs = controller.state.elapsed_secs(),
            "session resumed"
        );
        Ok(controller)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_random(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    #[must_use]
    pub fn with_exit_capabilities(mut self, capabilities: ExitCapabilities) -> Self {
        self.exit = ExitFlow::new(capabilities);
        self
    }

    #[must_use]
    pub fn template(&self) -> &SessionTemplate {
        &self.template
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[must_use]
    pub fn current_unit(&self) -> Option<&PlaybackUnit> {
        self.state.current_unit()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn end(&self) -> Option<SessionEnd> {
        self.end
    }

    #[must_use]
    pub fn exit_capabilities(&self) -> ExitCapabilities {
        self.exit.capabilities()
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Resolve the sequence, expand it and begin at the first unit.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::AlreadyStarted` unless the session is fresh and
    /// `PlaybackError::Empty` if the template yields no units.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(PlaybackError::AlreadyStarted);
        }
        self.begin()
    }

    /// Start over with the same template, discarding all progress.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running or
    /// finished, and `PlaybackError::Empty` if the template yields no units.
    pub fn restart(&mut self) -> Result<(), PlaybackError> {
        match self.phase {
            SessionPhase::InProgress | SessionPhase::Finished => self.begin(),
            phase => Err(PlaybackError::NotInProgress { phase }),
        }
    }

    fn begin(&mut self) -> Result<(), PlaybackError> {
        let sequence = sequence_for(&self.template);
        let units = expand_steps(&self.template, &sequence, &mut *self.rng);
        if units.is_empty() {
            return Err(PlaybackError::Empty);
        }

        self.state = PlaybackState::new(sequence, units);
        self.phase = SessionPhase::InProgress;
        self.started_at = Some(self.clock.now());
        self.finished_at = None;
        self.end = None;
        self.exit.close();
        info!(
            template = self.template.name(),
            units = self.state.units().len(),
            planned_secs = playback_duration(self.state.units()),
            "session started"
        );
        Ok(())
    }

    /// Finish on request and hand back the result for finalization.
    ///
    /// Calling it again after the session finished returns the same result.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` before start or while the exit
    /// overlay is open, and `PlaybackError::Exited` if the student left
    /// through the overlay.
    pub fn finish(&mut self) -> Result<FinishedSession, PlaybackError> {
        match self.phase {
            SessionPhase::InProgress => self.conclude(SessionEnd::Completed),
            SessionPhase::Finished => {}
            phase => return Err(PlaybackError::NotInProgress { phase }),
        }
        self.finished_session().ok_or(PlaybackError::Exited)
    }

    /// The result of a session that finished with a summary, if any.
    #[must_use]
    pub fn finished_session(&self) -> Option<FinishedSession> {
        let end = self.end.filter(|end| end.produces_summary())?;
        Some(FinishedSession {
            template_name: self.template.name().to_owned(),
            started_at: self.started_at?,
            finished_at: self.finished_at?,
            end,
            total_units: self.state.units().len(),
            completed: self.state.completed().len(),
            omitted: self.state.omitted().len(),
            pending: self.state.pending(),
            elapsed_secs: self.state.elapsed_secs(),
            planned_secs: playback_duration(self.state.units()),
            records: self.state.records().values().cloned().collect(),
        })
    }

    fn conclude(&mut self, end: SessionEnd) {
        self.phase = SessionPhase::Finished;
        self.end = Some(end);
        self.finished_at = Some(self.clock.now());
        self.exit.close();
        info!(
            template = self.template.name(),
            ?end,
            completed = self.state.completed().len(),
            omitted = self.state.omitted().len(),
            elapsed_secs = self.state.elapsed_secs(),
            "session finished"
        );
    }

    //
    // ─── UNITS ─────────────────────────────────────────────────────────────────
    //

    /// Mark a unit as done. Does not move the cursor.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a unit index.
    pub fn mark_completed(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.require_in_progress()?;
        self.state.mark_completed(index);
        debug!(index, "unit completed");
        Ok(())
    }

    /// Mark a unit as skipped. Does not move the cursor.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a unit index.
    pub fn mark_omitted(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.require_in_progress()?;
        self.state.mark_omitted(index);
        debug!(index, "unit omitted");
        Ok(())
    }

    /// Jump to any unit and restart its stopwatch.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a unit index.
    pub fn navigate_to(&mut self, index: usize) -> Result<(), PlaybackError> {
        self.require_in_progress()?;
        self.state.navigate_to(index);
        debug!(index, "navigated");
        Ok(())
    }

    /// Move to the following unit, staying on the last one. Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    pub fn next_unit(&mut self) -> Result<usize, PlaybackError> {
        let last = self.state.units().len().saturating_sub(1);
        let target = (self.state.current_index() + 1).min(last);
        self.navigate_to(target)?;
        Ok(target)
    }

    /// Move to the preceding unit, staying on the first one. Returns the new index.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    pub fn previous_unit(&mut self) -> Result<usize, PlaybackError> {
        let target = self.state.current_index().saturating_sub(1);
        self.navigate_to(target)?;
        Ok(target)
    }

    /// Add elapsed seconds to the session and the current unit.
    ///
    /// Time keeps counting while the exit overlay is open. Reaching the
    /// session limit finishes the session.
    pub fn tick(&mut self, delta_secs: u64) -> TickOutcome {
        if !matches!(
            self.phase,
            SessionPhase::InProgress | SessionPhase::ConfirmExit
        ) {
            return TickOutcome::Idle;
        }
        if self.state.add_elapsed(delta_secs, self.max_session_secs) {
            warn!(
                limit_secs = self.max_session_secs,
                "session time limit reached, finishing"
            );
            self.conclude(SessionEnd::TimeLimit);
            return TickOutcome::TimeLimitReached;
        }
        TickOutcome::Running
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.state.units().len(),
            completed: self.state.completed().len(),
            omitted: self.state.omitted().len(),
            pending: self.state.pending(),
            current_index: self.state.current_index(),
            elapsed_secs: self.state.elapsed_secs(),
            phase: self.phase,
        }
    }

    /// Time spent on unit `index` against its target: the running stopwatch
    /// for the current unit, the recorded time otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not a unit index.
    #[must_use]
    pub fn unit_timing(&self, index: usize) -> UnitTiming {
        let unit = &self.state.units()[index];
        let actual = if index == self.state.current_index() {
            self.state.unit_elapsed_secs()
        } else {
            self.state
                .records()
                .get(&index)
                .map_or(0, |record| record.actual_secs)
        };
        UnitTiming::classify(unit.block.kind, unit.block.duration_secs, actual)
    }

    fn require_in_progress(&self) -> Result<(), PlaybackError> {
        match self.phase {
            SessionPhase::InProgress => Ok(()),
            phase => Err(PlaybackError::NotInProgress { phase }),
        }
    }

    //
    // ─── EXIT ──────────────────────────────────────────────────────────────────
    //

    /// Open the confirm-exit overlay and list the available choices.
    ///
    /// # Errors
    ///
    /// Returns `PlaybackError::NotInProgress` unless the session is running.
    pub fn request_exit(&mut self) -> Result<Vec<ExitChoice>, PlaybackError> {
        self.require_in_progress()?;
        self.phase = SessionPhase::ConfirmExit;
        Ok(self.exit.open())
    }

    /// Close the overlay and keep practicing.
    ///
    /// # Errors
    ///
    /// Returns `ExitError::NotConfirming` if the overlay is not open.
    pub fn continue_session(&mut self) -> Result<(), ExitError> {
        self.exit.resolve(ExitChoice::Continue)?;
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Persist a resumable snapshot and leave the session.
    ///
    /// On a storage failure the overlay stays open so the student can retry
    /// or discard.
    ///
    /// # Errors
    ///
    /// Returns `ExitError::SaveUnavailable` in try mode, `ExitError::NotConfirming`
    /// if the overlay is not open, or the storage failure.
    pub async fn save_and_exit(
        &mut self,
        store: &dyn EntityStore,
        context: &UploadContext,
    ) -> Result<StoredRecord, ExitError> {
        self.exit.check(ExitChoice::SaveAndExit)?;

        let saved_at = self.clock.now();
        let snapshot = ResumeSnapshot {
            template_name: self.template.name().to_owned(),
            user_id: context.user_id.clone(),
            started_at: self.started_at.unwrap_or(saved_at),
            saved_at,
            state: self.state.clone(),
        };
        let stored = store
            .create(EntityKind::ResumeSnapshot, snapshot.to_record()?)
            .await?;

        info!(snapshot = %stored.id, "session progress saved");
        self.conclude(SessionEnd::SavedForLater);
        Ok(stored)
    }

    /// Leave without saving anything.
    ///
    /// # Errors
    ///
    /// Returns `ExitError::NotConfirming` if the overlay is not open.
    pub fn discard_and_exit(&mut self) -> Result<(), ExitError> {
        self.exit.resolve(ExitChoice::DiscardAndExit)?;
        self.conclude(SessionEnd::Discarded);
        Ok(())
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("template", &self.template.name())
            .field("phase", &self.phase)
            .field("units_len", &self.state.units().len())
            .field("current", &self.state.current_index())
            .field("elapsed_secs", &self.state.elapsed_secs())
            .field("started_at", &self.started_at)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
