//! Stock effects shipped with the binary.
//!
//! These exist so the floor has something to show out of the box; richer
//! effects register into the same [`Catalog`] through [`factory_for`].

mod discofloor;
mod rainbow;
mod solid_colour;

pub use discofloor::DiscoFloor;
pub use rainbow::Rainbow;
pub use solid_colour::SolidColour;

use crate::catalog::Catalog;
use crate::effect::{EffectConfig, factory_for};
use serde_json::Value;

/// Catalog with every stock effect registered under its display name.
pub fn builtin_catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.register("DiscoFloor", factory_for::<DiscoFloor>());
    catalog.register("Rainbow", factory_for::<Rainbow>());
    catalog.register("SolidColour", factory_for::<SolidColour>());
    catalog
}

/// Read a non-negative whole number, accepting numeric strings.
fn config_u32(config: &EffectConfig, key: &str) -> Option<u32> {
    match config.get(key)? {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
