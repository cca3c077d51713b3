//! Live-insertion feed: a playlist that grows while the show runs.
//!
//! Outside callers (the HTTP surface, a mention listener) hold a
//! [`LiveFeedHandle`] and queue requests from their own threads. The
//! dedicated playlist lives on the control loop and drains the queue
//! whenever it is asked for its current effect, so position, state and
//! timers stay owned by the loop alone.
//!
//! The playlist runs in `Once` mode: the most recent request keeps showing
//! until another one arrives.

use crate::canvas::Canvas;
use crate::catalog::Catalog;
use crate::effect::{EffectConfig, with_floor_size};
use crate::error::FloorError;
use crate::handle::EffectHandle;
use crate::playlist::Playlist;
use crate::show::{ShowStatus, lock_status};
use crate::{Color, FloorSize};
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// How long a requested effect runs before the next request may take over.
pub const DEFAULT_REQUEST_SECS: i64 = 6;

// ── Acknowledgement ──────────────────────────────────────────────────

/// Told when a requested effect actually reaches the floor.
pub trait Acknowledger: Send {
    fn acknowledge(&mut self, requested_by: &str, effect: &str);
}

pub fn acknowledgement(requested_by: &str, effect: &str) -> String {
    format!("Starting {effect} for @{requested_by}")
}

/// Writes acknowledgements to the log.
pub struct LogAcknowledger;

impl Acknowledger for LogAcknowledger {
    fn acknowledge(&mut self, requested_by: &str, effect: &str) {
        tracing::info!("{}", acknowledgement(requested_by, effect));
    }
}

/// Logs, and publishes the message in the shared show status.
pub struct StatusAcknowledger {
    status: Arc<Mutex<ShowStatus>>,
}

impl StatusAcknowledger {
    pub fn new(status: Arc<Mutex<ShowStatus>>) -> Self {
        Self { status }
    }
}

impl Acknowledger for StatusAcknowledger {
    fn acknowledge(&mut self, requested_by: &str, effect: &str) {
        let message = acknowledgement(requested_by, effect);
        tracing::info!("{}", message);
        lock_status(&self.status).announce(message);
    }
}

// ── Queue ────────────────────────────────────────────────────────────

/// A fully built entry waiting to be appended.
pub struct Insertion {
    pub handle: EffectHandle,
    pub requested_by: String,
}

/// The control-loop side of the feed, carried by the live playlist.
pub struct LiveState {
    inbox: Receiver<Insertion>,
    requested_by: HashMap<usize, String>,
    acknowledger: Box<dyn Acknowledger>,
}

impl LiveState {
    /// Append everything queued so far, recording who asked for each entry.
    pub(crate) fn drain_into(&mut self, entries: &mut Vec<EffectHandle>) {
        while let Ok(Insertion {
            handle,
            requested_by,
        }) = self.inbox.try_recv()
        {
            entries.push(handle);
            let index = entries.len() - 1;
            tracing::info!(
                "Queued {} at #{} for {}",
                entries[index].name(),
                index,
                requested_by
            );
            self.requested_by.insert(index, requested_by);
        }
    }

    /// Called when `index` starts. Each request is acknowledged at most once;
    /// the default entry at index 0 never is.
    pub(crate) fn acknowledge(&mut self, index: usize, effect: &str) {
        if index == 0 {
            return;
        }
        if let Some(who) = self.requested_by.remove(&index) {
            self.acknowledger.acknowledge(&who, effect);
        }
    }
}

// ── Feed ─────────────────────────────────────────────────────────────

/// The dedicated playlist plus the handle that feeds it.
pub struct LiveFeed {
    playlist: Playlist,
    handle: LiveFeedHandle,
}

impl LiveFeed {
    /// Build the playlist seeded with `default_effect` at index 0.
    pub fn new(
        catalog: Catalog,
        default_effect: &str,
        floor: FloorSize,
        acknowledger: Box<dyn Acknowledger>,
    ) -> Result<Self, FloorError> {
        let factory = catalog
            .get(default_effect)
            .cloned()
            .ok_or_else(|| FloorError::UnknownEffect(default_effect.to_string()))?;
        let seed = EffectHandle::new(default_effect, factory, Some(with_floor_size(None, floor)))?;

        let (tx, rx) = mpsc::channel();
        let state = LiveState {
            inbox: rx,
            requested_by: HashMap::new(),
            acknowledger,
        };

        let mut playlist = Playlist::live("Live requests", state);
        playlist.add(seed);

        Ok(Self {
            playlist,
            handle: LiveFeedHandle {
                catalog,
                floor,
                sender: tx,
            },
        })
    }

    pub fn handle(&self) -> LiveFeedHandle {
        self.handle.clone()
    }

    pub fn into_parts(self) -> (Playlist, LiveFeedHandle) {
        (self.playlist, self.handle)
    }
}

/// Cloneable sender side of the feed. Safe to use from any thread.
#[derive(Clone)]
pub struct LiveFeedHandle {
    catalog: Catalog,
    floor: FloorSize,
    sender: Sender<Insertion>,
}

impl LiveFeedHandle {
    /// Queue `effect_name` to run for `duration_secs` (default six seconds).
    ///
    /// The effect is built here, on the caller's thread; the control loop
    /// only ever sees finished entries. Unknown names are logged and
    /// rejected without touching the playlist.
    pub fn add_entry(
        &self,
        effect_name: &str,
        requested_by: &str,
        duration_secs: Option<i64>,
    ) -> Result<(), FloorError> {
        let Some(factory) = self.catalog.get(effect_name).cloned() else {
            tracing::warn!(
                "Unable to find effect {} requested by {}",
                effect_name,
                requested_by
            );
            return Err(FloorError::UnknownEffect(effect_name.to_string()));
        };

        let mut config = EffectConfig::new();
        config.insert(
            "duration".to_string(),
            duration_secs.unwrap_or(DEFAULT_REQUEST_SECS).into(),
        );
        let handle = EffectHandle::new(
            effect_name,
            factory,
            Some(with_floor_size(Some(config), self.floor)),
        )?;

        tracing::info!("Adding {} as requested by {}", effect_name, requested_by);
        self.sender
            .send(Insertion {
                handle,
                requested_by: requested_by.to_string(),
            })
            .map_err(|_| FloorError::FeedClosed)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}

/// Black background with a blue "T".
pub(crate) fn draw_splash(canvas: &mut Canvas) {
    canvas.fill(Color::BLACK);
    let cx = canvas.width() as i32 / 2;
    let cy = canvas.height() as i32 / 2;
    canvas.draw_line(cx - 3, cy - 4, cx + 3, cy - 4, Color::BLUE);
    canvas.draw_line(cx, cy - 4, cx, cy + 4, Color::BLUE);
}

// ── Mentions ─────────────────────────────────────────────────────────

/// Keywords recognised in mentions, paired with the effect they ask for.
pub const DEFAULT_KEYWORDS: &[(&str, &str)] = &[
    ("disco", "DiscoFloor"),
    ("rainbow", "Rainbow"),
    ("colour", "SolidColour"),
    ("color", "SolidColour"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MentionOutcome {
    /// Our own messages, echoed back.
    Ignored,
    Requested {
        effect: String,
        keyword: String,
        reply: String,
    },
    Unrecognised {
        reply: String,
    },
}

/// Turns free-text mentions into effect requests.
#[derive(Clone, Debug)]
pub struct MentionRouter {
    own_handle: String,
    keywords: Vec<(String, String)>,
}

impl MentionRouter {
    pub fn new(own_handle: &str) -> Self {
        Self::with_keywords(own_handle, DEFAULT_KEYWORDS.iter().copied())
    }

    pub fn with_keywords<'a>(
        own_handle: &str,
        keywords: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            own_handle: own_handle.trim_start_matches('@').to_string(),
            keywords: keywords
                .into_iter()
                .map(|(k, e)| (k.to_lowercase(), e.to_string()))
                .collect(),
        }
    }

    /// Match `text` against the keywords, case-insensitively. When several
    /// match, the last one in keyword order wins.
    pub fn route(&self, author: &str, text: &str) -> MentionOutcome {
        let author = author.trim_start_matches('@');
        if author.eq_ignore_ascii_case(&self.own_handle) {
            tracing::debug!("Not replying to ourselves");
            return MentionOutcome::Ignored;
        }

        let text = text.to_lowercase();
        let matched = self
            .keywords
            .iter()
            .rev()
            .find(|(keyword, _)| text.contains(keyword.as_str()));

        match matched {
            Some((keyword, effect)) => MentionOutcome::Requested {
                effect: effect.clone(),
                keyword: keyword.clone(),
                reply: format!(
                    "@{author} - Thank you for your interest, I'll be sure to pass on your request for {keyword}"
                ),
            },
            None => MentionOutcome::Unrecognised {
                reply: format!("@{author} - Sorry, I can't work out what you wanted to display"),
            },
        }
    }
}
