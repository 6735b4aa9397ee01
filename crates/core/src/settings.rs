use std::time::Duration;
use thiserror::Error;

pub const MIN_BPM: u32 = 30;
pub const MAX_BPM: u32 = 300;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("bpm must be between {MIN_BPM} and {MAX_BPM}, got {0}")]
    InvalidBpm(u32),

    #[error("volume must be in [0, 1], got {0}")]
    InvalidVolume(f32),

    #[error("metronome poll interval must be > 0 and shorter than the lookahead window")]
    InvalidSchedulingWindow,

    #[error("maximum session length must be > 0")]
    InvalidMaxSession,
}

/// Timing and sound parameters of the lookahead metronome.
#[derive(Debug, Clone, PartialEq)]
pub struct MetronomeSettings {
    bpm: u32,
    volume: f32,
    poll_interval: Duration,
    lookahead: Duration,
    click_length: Duration,
    start_offset: Duration,
}

impl Default for MetronomeSettings {
    fn default() -> Self {
        Self {
            bpm: 60,
            volume: 0.5,
            poll_interval: Duration::from_millis(25),
            lookahead: Duration::from_millis(100),
            click_length: Duration::from_millis(50),
            start_offset: Duration::from_millis(50),
        }
    }
}

impl MetronomeSettings {
    #[must_use]
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    #[must_use]
    pub fn volume(&self) -> f32 {
        self.volume
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    #[must_use]
    pub fn click_length(&self) -> Duration {
        self.click_length
    }

    /// Delay between pressing start and the first tick.
    #[must_use]
    pub fn start_offset(&self) -> Duration {
        self.start_offset
    }
}

/// Runtime configuration for the session player.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    metronome: MetronomeSettings,
    max_session_secs: u64,
    finalize_grace: Duration,
    upload_timeout: Option<Duration>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            metronome: MetronomeSettings::default(),
            max_session_secs: 5 * 60 * 60,
            finalize_grace: Duration::from_millis(1500),
            upload_timeout: None,
        }
    }
}

impl PlayerSettings {
    #[must_use]
    pub fn metronome(&self) -> &MetronomeSettings {
        &self.metronome
    }

    /// Elapsed time at which a running session finishes on its own.
    #[must_use]
    pub fn max_session_secs(&self) -> u64 {
        self.max_session_secs
    }

    /// Pause between "saved" and leaving the summary screen.
    #[must_use]
    pub fn finalize_grace(&self) -> Duration {
        self.finalize_grace
    }

    #[must_use]
    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout
    }
}

/// Unvalidated overrides, typically read from the environment or flags.
#[derive(Clone, Debug, Default)]
pub struct PlayerSettingsDraft {
    pub bpm: Option<u32>,
    pub volume: Option<f32>,
    pub poll_interval_ms: Option<u64>,
    pub lookahead_ms: Option<u64>,
    pub max_session_secs: Option<u64>,
    pub finalize_grace_ms: Option<u64>,
    pub upload_timeout_secs: Option<u64>,
}

impl PlayerSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the draft and fill unset values with defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if any override is out of range.
    pub fn validate(self) -> Result<PlayerSettings, SettingsError> {
        let defaults = PlayerSettings::default();
        let mut metronome = defaults.metronome.clone();

        if let Some(bpm) = self.bpm {
            if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
                return Err(SettingsError::InvalidBpm(bpm));
            }
            metronome.bpm = bpm;
        }
        if let Some(volume) = self.volume {
            if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
                return Err(SettingsError::InvalidVolume(volume));
            }
            metronome.volume = volume;
        }
        if let Some(ms) = self.poll_interval_ms {
            metronome.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.lookahead_ms {
            metronome.lookahead = Duration::from_millis(ms);
        }
        if metronome.poll_interval.is_zero() || metronome.poll_interval >= metronome.lookahead {
            return Err(SettingsError::InvalidSchedulingWindow);
        }

        let max_session_secs = self.max_session_secs.unwrap_or(defaults.max_session_secs);
        if max_session_secs == 0 {
            return Err(SettingsError::InvalidMaxSession);
        }

        Ok(PlayerSettings {
            metronome,
            max_session_secs,
            finalize_grace: self
                .finalize_grace_ms
                .map_or(defaults.finalize_grace, Duration::from_millis),
            upload_timeout: self.upload_timeout_secs.map(Duration::from_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_draft_yields_defaults() {
        let settings = PlayerSettingsDraft::new().validate().unwrap();
        assert_eq!(settings, PlayerSettings::default());
        assert_eq!(settings.metronome().bpm(), 60);
        assert_eq!(settings.max_session_secs(), 18_000);
        assert_eq!(settings.finalize_grace(), Duration::from_millis(1500));
    }

    #[test]
    fn overrides_are_applied() {
        let draft = PlayerSettingsDraft {
            bpm: Some(120),
            volume: Some(0.0),
            upload_timeout_secs: Some(30),
            ..PlayerSettingsDraft::default()
        };
        let settings = draft.validate().unwrap();
        assert_eq!(settings.metronome().bpm(), 120);
        assert_eq!(settings.metronome().volume(), 0.0);
        assert_eq!(settings.upload_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let bpm = PlayerSettingsDraft {
            bpm: Some(12),
            ..PlayerSettingsDraft::default()
        };
        assert_eq!(bpm.validate(), Err(SettingsError::InvalidBpm(12)));

        let volume = PlayerSettingsDraft {
            volume: Some(1.5),
            ..PlayerSettingsDraft::default()
        };
        assert_eq!(volume.validate(), Err(SettingsError::InvalidVolume(1.5)));

        let window = PlayerSettingsDraft {
            poll_interval_ms: Some(200),
            ..PlayerSettingsDraft::default()
        };
        assert_eq!(window.validate(), Err(SettingsError::InvalidSchedulingWindow));
    }
}
