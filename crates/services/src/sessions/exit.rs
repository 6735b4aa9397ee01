use crate::error::ExitError;

/// What the student can pick while the confirm-exit overlay is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitChoice {
    Continue,
    SaveAndExit,
    DiscardAndExit,
}

/// Which exits a session offers. Try sessions cannot be saved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCapabilities {
    allow_save: bool,
}

impl Default for ExitCapabilities {
    fn default() -> Self {
        Self { allow_save: true }
    }
}

impl ExitCapabilities {
    #[must_use]
    pub fn full() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn try_mode() -> Self {
        Self { allow_save: false }
    }

    #[must_use]
    pub fn allow_save(&self) -> bool {
        self.allow_save
    }
}

/// Confirm-exit overlay state.
#[derive(Debug, Clone, Default)]
pub struct ExitFlow {
    capabilities: ExitCapabilities,
    confirming: bool,
}

impl ExitFlow {
    #[must_use]
    pub fn new(capabilities: ExitCapabilities) -> Self {
        Self {
            capabilities,
            confirming: false,
        }
    }

    #[must_use]
    pub fn capabilities(&self) -> ExitCapabilities {
        self.capabilities
    }

    #[must_use]
    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    /// Choices offered by the overlay, in display order.
    #[must_use]
    pub fn choices(&self) -> Vec<ExitChoice> {
        let mut choices = vec![ExitChoice::Continue];
        if self.capabilities.allow_save {
            choices.push(ExitChoice::SaveAndExit);
        }
        choices.push(ExitChoice::DiscardAndExit);
        choices
    }

    pub(crate) fn open(&mut self) -> Vec<ExitChoice> {
        self.confirming = true;
        self.choices()
    }

    pub(crate) fn close(&mut self) {
        self.confirming = false;
    }

    /// Checks that `choice` can be taken right now without closing the overlay.
    ///
    /// # Errors
    ///
    /// Returns `ExitError::NotConfirming` if the overlay is closed and
    /// `ExitError::SaveUnavailable` if saving is disabled.
    pub fn check(&self, choice: ExitChoice) -> Result<(), ExitError> {
        if !self.confirming {
            return Err(ExitError::NotConfirming);
        }
        if choice == ExitChoice::SaveAndExit && !self.capabilities.allow_save {
            return Err(ExitError::SaveUnavailable);
        }
        Ok(())
    }

    pub(crate) fn resolve(&mut self, choice: ExitChoice) -> Result<ExitChoice, ExitError> {
        self.check(choice)?;
        self.close();
        Ok(choice)
    }
}
