//! One playlist entry: an effect instance plus what it was built from.

use crate::canvas::Canvas;
use crate::effect::{Effect, EffectConfig, EffectFactory};
use crate::error::FloorError;
use crate::input::InputEvent;
use serde_json::Value;

/// How long an entry runs when its config doesn't say.
pub const DEFAULT_DURATION_MS: i64 = 5000;

/// Wraps a single effect instance with its name, factory and configuration.
///
/// The instance is owned exclusively by the handle and is reused across
/// visits: [`EffectHandle::reset`] re-applies the stored configuration
/// instead of building a new instance.
pub struct EffectHandle {
    name: String,
    factory: EffectFactory,
    instance: Box<dyn Effect>,
    config: Option<EffectConfig>,
}

impl EffectHandle {
    /// Build an instance from `factory` and configure it straight away.
    ///
    /// Fails if either step fails; callers loading many entries skip the
    /// failed one and carry on.
    pub fn new(
        name: impl Into<String>,
        factory: EffectFactory,
        config: Option<EffectConfig>,
    ) -> Result<Self, FloorError> {
        let name = name.into();
        let mut instance = factory().map_err(|source| FloorError::Effect {
            name: name.clone(),
            source,
        })?;

        let empty = EffectConfig::new();
        instance
            .configure(config.as_ref().unwrap_or(&empty))
            .map_err(|source| FloorError::Effect {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            name,
            factory,
            instance,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn factory(&self) -> &EffectFactory {
        &self.factory
    }

    pub fn config(&self) -> Option<&EffectConfig> {
        self.config.as_ref()
    }

    /// Re-apply the stored configuration so the effect restarts cleanly.
    pub fn reset(&mut self) -> Result<(), FloorError> {
        let empty = EffectConfig::new();
        self.instance
            .configure(self.config.as_ref().unwrap_or(&empty))
            .map_err(|source| self.effect_error(source))
    }

    pub fn start(&mut self) -> Result<(), FloorError> {
        self.instance
            .start()
            .map_err(|source| self.effect_error(source))
    }

    pub fn stop(&mut self) {
        self.instance.stop();
    }

    pub fn pause(&mut self) {
        self.instance.pause();
    }

    pub fn resume(&mut self) {
        self.instance.resume();
    }

    pub fn handle_event(&mut self, event: InputEvent) -> Option<InputEvent> {
        self.instance.handle_event(event)
    }

    /// Draw one frame. Errors are returned so the show loop can decide what
    /// to put on the floor instead.
    pub fn draw_frame(&mut self, canvas: &mut Canvas) -> Result<bool, FloorError> {
        self.instance
            .draw_frame(canvas)
            .map_err(|source| self.effect_error(source))
    }

    /// Draw this entry's menu splash.
    ///
    /// Never fails: an effect error becomes the error frame and a missing
    /// splash becomes the "unknown" frame. Returns whether the effect drew
    /// its own splash.
    pub fn draw_splash(&self, canvas: &mut Canvas) -> bool {
        match self.instance.draw_splash(canvas) {
            Ok(true) => true,
            Ok(false) => {
                canvas.draw_unknown();
                false
            }
            Err(e) => {
                tracing::warn!("Splash for {} failed: {}", self.name, e);
                canvas.draw_error();
                false
            }
        }
    }

    /// Requested run time in milliseconds.
    ///
    /// `duration` is read as whole seconds; anything missing or unreadable
    /// falls back to [`DEFAULT_DURATION_MS`].
    pub fn duration_ms(&self) -> i64 {
        self.config
            .as_ref()
            .and_then(|config| config.get("duration"))
            .and_then(parse_seconds)
            .map(|secs| secs.saturating_mul(1000))
            .unwrap_or(DEFAULT_DURATION_MS)
    }

    fn effect_error(&self, source: crate::error::EffectError) -> FloorError {
        FloorError::Effect {
            name: self.name.clone(),
            source,
        }
    }
}

fn parse_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
