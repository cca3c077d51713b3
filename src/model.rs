//! The set of playlists the show can choose from.
//!
//! Index 0 is always the all-effects playlist, which grows as effects are
//! registered. User playlists (from definition files or built in code) and
//! the live playlist follow it. The active playlist is stored as an index,
//! so it is always one of `playlists`.

use crate::catalog::Catalog;
use crate::effect::{EffectConfig, EffectFactory, with_floor_size};
use crate::error::FloorError;
use crate::handle::EffectHandle;
use crate::playlist::{LoopMode, Playlist};
use crate::{FloorSize, Millis};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tried in order at startup when nothing more specific was asked for.
pub const DEFAULT_STARTUP_EFFECTS: &[&str] = &["DiscoFloor", "Rainbow"];

/// What the operator asked for on the command line.
#[derive(Clone, Debug, Default)]
pub struct Startup {
    /// Run this one effect indefinitely.
    pub effect: Option<String>,
    /// Playlist definition files, in the order given.
    pub playlist_files: Vec<PathBuf>,
}

/// On-disk playlist definition.
///
/// ```json
/// { "name": "Evening", "loop_mode": "once",
///   "effects": [ { "name": "Rainbow", "duration": 30, "speed": 4 } ] }
/// ```
#[derive(Debug, Deserialize)]
struct PlaylistDefinition {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    loop_mode: LoopMode,
    #[serde(alias = "plugins")]
    effects: Vec<Value>,
}

pub struct PlaylistCollection {
    playlists: Vec<Playlist>,
    active: Option<usize>,
    catalog: Catalog,
    floor: FloorSize,
}

impl PlaylistCollection {
    pub fn new(floor: FloorSize) -> Self {
        Self {
            playlists: vec![Playlist::all_effects()],
            active: None,
            catalog: Catalog::new(),
            floor,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn floor(&self) -> FloorSize {
        self.floor
    }

    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, index: usize) -> Option<&Playlist> {
        self.playlists.get(index)
    }

    pub fn playlist_mut(&mut self, index: usize) -> Option<&mut Playlist> {
        self.playlists.get_mut(index)
    }

    pub fn all_effects(&self) -> &Playlist {
        &self.playlists[0]
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Add `factory` to the catalog and an entry for it to the all-effects
    /// playlist. An effect that fails to build is kept in the catalog but
    /// left out of the playlist.
    pub fn register_effect(&mut self, name: &str, factory: EffectFactory) {
        tracing::info!("Adding effect {} to the menu list", name);
        self.catalog.register(name, factory.clone());

        let config = with_floor_size(None, self.floor);
        match EffectHandle::new(name, factory, Some(config)) {
            Ok(handle) => {
                self.playlists[0].add(handle);
            }
            Err(e) => tracing::warn!("Failed to add {} to the model: {}", name, e),
        }
    }

    /// Register every catalog entry, in name order.
    pub fn register_catalog(&mut self, catalog: &Catalog) {
        for (name, factory) in catalog.iter() {
            self.register_effect(name, factory.clone());
        }
    }

    pub fn add_playlist(&mut self, playlist: Playlist) -> usize {
        tracing::info!("Adding playlist {} ({} entries)", playlist.name(), playlist.len());
        self.playlists.push(playlist);
        tracing::debug!("Playlist queue is now of size {}", self.playlists.len());
        self.playlists.len() - 1
    }

    /// Build a playlist from a parsed definition.
    ///
    /// Entries without a name, naming an unknown effect, or failing to
    /// build are skipped with a warning. Returns `None` only when the
    /// definition as a whole doesn't have the expected shape.
    pub fn add_playlist_from_definition(&mut self, definition: &Value) -> Option<usize> {
        let definition = match PlaylistDefinition::deserialize(definition) {
            Ok(definition) => definition,
            Err(e) => {
                tracing::error!("Unable to parse playlist: {}", e);
                return None;
            }
        };

        let name = definition
            .name
            .unwrap_or_else(|| format!("Playlist {}", self.playlists.len()));
        let mut playlist = Playlist::user(name).with_loop_mode(definition.loop_mode);

        for details in definition.effects {
            if let Some(handle) = self.build_entry(details) {
                playlist.add(handle);
            }
        }

        Some(self.add_playlist(playlist))
    }

    fn build_entry(&self, details: Value) -> Option<EffectHandle> {
        let mut options = match details {
            Value::Object(options) => options,
            other => {
                tracing::warn!("Playlist entry is not an object: {}", other);
                return None;
            }
        };

        let Some(Value::String(name)) = options.remove("name") else {
            tracing::warn!("Missing name for entry: {:?}", options);
            return None;
        };

        let Some(factory) = self.catalog.get(&name).cloned() else {
            tracing::warn!("Unable to locate {} in available effects", name);
            return None;
        };

        let config: EffectConfig = with_floor_size(Some(options), self.floor);
        match EffectHandle::new(&name, factory, Some(config)) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("Failed to add {} to playlist: {}", name, e);
                None
            }
        }
    }

    /// Load a JSON definition from disk. Read and parse failures are logged
    /// and leave the model untouched.
    pub fn add_playlist_from_file(&mut self, path: &Path) -> Option<usize> {
        match read_definition(path) {
            Ok(definition) => self.add_playlist_from_definition(&definition),
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Activate the all-effects playlist on the entry called `name` and
    /// leave it running indefinitely.
    pub fn select_effect_by_name(&mut self, name: &str, now: Millis) -> Option<&mut EffectHandle> {
        tracing::info!("Attempting to set current effect to: {}", name);
        let index = self.playlists[0]
            .entries()
            .iter()
            .position(|entry| entry.name() == name)?;

        tracing::info!("Starting requested effect: {} at #{}", name, index);
        self.switch_to(0);
        self.playlists[0].start_at(index, now)
    }

    /// Activate the playlist at `index`, from the top.
    pub fn select_playlist(&mut self, index: usize) -> Result<&mut Playlist, FloorError> {
        if index >= self.playlists.len() {
            return Err(FloorError::UnknownPlaylist(index));
        }
        self.switch_to(index);
        let playlist = &mut self.playlists[index];
        playlist.reset_state();
        Ok(playlist)
    }

    fn switch_to(&mut self, index: usize) {
        if let Some(previous) = self.active.and_then(|i| self.playlists.get_mut(i)) {
            previous.stop_current();
        }
        self.active = Some(index);
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_playlist(&self) -> Option<&Playlist> {
        self.active.and_then(|i| self.playlists.get(i))
    }

    pub fn active_playlist_mut(&mut self) -> Option<&mut Playlist> {
        self.active.and_then(|i| self.playlists.get_mut(i))
    }

    /// The effect that should be on the floor now, if any.
    pub fn current_effect(&mut self, now: Millis) -> Option<&mut EffectHandle> {
        self.active_playlist_mut()?.get_current(now)
    }

    /// Pick what to show first.
    ///
    /// An explicitly requested effect that isn't in the catalog is an
    /// error; everything else degrades to the next option down.
    pub fn bootstrap(&mut self, startup: &Startup, now: Millis) -> Result<(), FloorError> {
        if let Some(effect) = &startup.effect {
            return match self.select_effect_by_name(effect, now) {
                Some(_) => Ok(()),
                None => Err(FloorError::UnknownEffect(effect.clone())),
            };
        }

        let loaded: Vec<usize> = startup
            .playlist_files
            .iter()
            .filter_map(|path| self.add_playlist_from_file(path))
            .collect();
        if let Some(&first) = loaded.first() {
            tracing::info!("Starting playlist #{}", first);
            self.select_playlist(first)?;
            return Ok(());
        }

        for name in DEFAULT_STARTUP_EFFECTS {
            if self.select_effect_by_name(name, now).is_some() {
                return Ok(());
            }
        }

        tracing::info!("No default effect available, starting the all-effects playlist");
        self.select_playlist(0)?;
        Ok(())
    }
}

fn read_definition(path: &Path) -> Result<Value, FloorError> {
    let contents = std::fs::read_to_string(path).map_err(|source| FloorError::PlaylistFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

impl fmt::Display for PlaylistCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Effects: {}", self.catalog.names().join(", "))?;
        for playlist in &self.playlists {
            write!(f, "{playlist}")?;
        }
        Ok(())
    }
}
