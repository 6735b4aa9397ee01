use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MediaLinkError {
    #[error("media link cannot be empty")]
    Empty,

    #[error("media link is not an absolute URL: {0}")]
    InvalidUrl(String),
}

/// Absolute URL attached to a session summary (recording, reference video, ...).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaLink(Url);

impl MediaLink {
    /// Parse and validate a link.
    ///
    /// # Errors
    ///
    /// Returns `MediaLinkError` if the input is blank or not an absolute URL.
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, MediaLinkError> {
        let s = raw.as_ref().trim();
        if s.is_empty() {
            return Err(MediaLinkError::Empty);
        }
        Url::parse(s)
            .map(Self)
            .map_err(|_| MediaLinkError::InvalidUrl(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl fmt::Debug for MediaLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaLink({})", self.0)
    }
}

impl fmt::Display for MediaLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for MediaLink {
    type Error = MediaLinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<MediaLink> for String {
    fn from(link: MediaLink) -> Self {
        link.0.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_urls() {
        let link = MediaLink::parse(" https://youtu.be/abc ").unwrap();
        assert_eq!(link.url().host_str(), Some("youtu.be"));
    }

    #[test]
    fn rejects_blank_and_relative() {
        assert_eq!(MediaLink::parse("  "), Err(MediaLinkError::Empty));
        assert!(matches!(
            MediaLink::parse("clips/take1.mp4"),
            Err(MediaLinkError::InvalidUrl(_))
        ));
    }
}
