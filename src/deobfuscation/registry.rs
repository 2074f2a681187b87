//! Ordered registry of techniques.

use std::sync::Arc;

use crate::deobfuscation::technique::Technique;

/// Holds the techniques the engine runs, in priority order.
///
/// Registration order is execution order. Registering a technique whose id is
/// already present replaces it in place.
#[derive(Default, Clone)]
pub struct TechniqueRegistry {
    techniques: Vec<Arc<dyn Technique>>,
}

impl TechniqueRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a technique at the end, or replaces one with the same id.
    ///
    /// # Arguments
    ///
    /// * `technique` - The technique to register.
    pub fn register(&mut self, technique: Arc<dyn Technique>) {
        match self
            .techniques
            .iter_mut()
            .find(|existing| existing.id() == technique.id())
        {
            Some(slot) => *slot = technique,
            None => self.techniques.push(technique),
        }
    }

    /// Looks a technique up by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Technique>> {
        self.techniques.iter().find(|technique| technique.id() == id)
    }

    /// Iterates in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Technique>> {
        self.techniques.iter()
    }

    /// Identifiers in execution order.
    #[must_use]
    pub fn ids(&self) -> Vec<&'static str> {
        self.techniques.iter().map(|technique| technique.id()).collect()
    }

    /// Ids of the techniques whose heuristic matches `code`.
    #[must_use]
    pub fn detect(&self, code: &str) -> Vec<&'static str> {
        self.techniques
            .iter()
            .filter(|technique| technique.detect(code))
            .map(|technique| technique.id())
            .collect()
    }

    /// Number of registered techniques.
    #[must_use]
    pub fn len(&self) -> usize {
        self.techniques.len()
    }

    /// Returns `true` if no technique is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.techniques.is_empty()
    }
}
