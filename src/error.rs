//! Error types shared across the scheduler.
//!
//! Most component-to-component calls return `Option` for "nothing
//! available". `FloorError` covers the cases a caller may want to report:
//! startup lookups, playlist files, and effect failures surfaced at the
//! boundary where the scheduler calls into an effect.

use std::path::PathBuf;

/// Result alias that carries [`FloorError`].
pub type Result<T> = std::result::Result<T, FloorError>;

#[derive(Debug, thiserror::Error)]
pub enum FloorError {
    #[error("unknown effect: {0}")]
    UnknownEffect(String),

    #[error("no playlist at index {0}")]
    UnknownPlaylist(usize),

    #[error("effect {name} failed: {source}")]
    Effect {
        name: String,
        #[source]
        source: EffectError,
    },

    #[error("unable to read playlist {}: {source}", path.display())]
    PlaylistFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse playlist: {0}")]
    PlaylistParse(#[from] serde_json::Error),

    #[error("live feed is not accepting requests")]
    FeedClosed,

    #[error("failed to install signal handler: {0}")]
    Signal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure raised by an effect implementation.
///
/// Effects are third-party code as far as the scheduler is concerned, so
/// this carries only a readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct EffectError(pub String);

impl EffectError {
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self(msg.into())
    }
}

impl From<&str> for EffectError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for EffectError {
    fn from(value: String) -> Self {
        Self(value)
    }
}
