//! The universe of effects the floor knows how to build, keyed by name.
//!
//! Discovery itself is someone else's job; the catalog is just the
//! resulting `name -> factory` map. It is an ordinary value that gets passed
//! to whoever needs it, so the control loop and the live feed each hold
//! their own clone.

use crate::effect::EffectFactory;
use std::collections::BTreeMap;

#[derive(Clone, Default)]
pub struct Catalog {
    factories: BTreeMap<String, EffectFactory>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a factory. A later registration under the same name wins.
    pub fn register(&mut self, name: impl Into<String>, factory: EffectFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn get(&self, name: &str) -> Option<&EffectFactory> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// All names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EffectFactory)> {
        self.factories.iter().map(|(name, factory)| (name.as_str(), factory))
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
