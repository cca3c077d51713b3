//! The capability interface every visual effect implements.
//!
//! The scheduler calls any of these methods unconditionally, so every
//! method has a do-nothing default. An effect only overrides what it cares
//! about; most override `draw_frame` and `draw_splash` and nothing else.

use crate::canvas::Canvas;
use crate::error::EffectError;
use crate::input::InputEvent;
use crate::FloorSize;
use std::sync::Arc;

/// Opaque per-entry configuration. The scheduler reads `duration` and
/// passes everything else through to the effect untouched.
pub type EffectConfig = serde_json::Map<String, serde_json::Value>;

/// Zero-argument constructor for an effect.
///
/// # Rust concept: trait objects behind Arc
/// `Arc<dyn Fn ...>` lets the catalog hand the same factory to the control
/// loop and to the live feed's request thread without copying closures.
pub type EffectFactory = Arc<dyn Fn() -> Result<Box<dyn Effect>, EffectError> + Send + Sync>;

pub trait Effect: Send {
    /// Apply configuration. Called once after construction and again on
    /// every reset, so it must be safe to repeat.
    fn configure(&mut self, _config: &EffectConfig) -> Result<(), EffectError> {
        Ok(())
    }

    /// Called when the effect becomes the one on the floor.
    fn start(&mut self) -> Result<(), EffectError> {
        Ok(())
    }

    /// Called when the effect stops showing. Must return promptly and be
    /// idempotent; effects with background work hand it off here.
    fn stop(&mut self) {}

    /// The floor has been taken over (e.g. by the menu) for a while.
    fn pause(&mut self) {}

    fn resume(&mut self) {}

    /// Return `None` to consume the event, or hand it back.
    fn handle_event(&mut self, event: InputEvent) -> Option<InputEvent> {
        Some(event)
    }

    /// Draw one frame. `Ok(false)` means nothing was drawn this tick.
    fn draw_frame(&mut self, _canvas: &mut Canvas) -> Result<bool, EffectError> {
        Ok(false)
    }

    /// Draw a still that represents this effect in the menu.
    fn draw_splash(&self, _canvas: &mut Canvas) -> Result<bool, EffectError> {
        Ok(false)
    }
}

/// Fill in the floor dimensions as `size: [cols, rows]`, keeping whatever
/// else the entry was configured with. An explicit `size` is left alone.
pub fn with_floor_size(config: Option<EffectConfig>, floor: FloorSize) -> EffectConfig {
    let mut config = config.unwrap_or_default();
    config
        .entry("size")
        .or_insert_with(|| serde_json::json!([floor.cols, floor.rows]));
    config
}

/// Factory for any effect with a `Default` constructor.
pub fn factory_for<E>() -> EffectFactory
where
    E: Effect + Default + 'static,
{
    Arc::new(|| -> Result<Box<dyn Effect>, EffectError> { Ok(Box::new(E::default())) })
}
