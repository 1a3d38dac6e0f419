//! Template registry for storing and retrieving template definitions

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use super::definition::TemplateDefinition;

/// Errors in template configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// Template not found in registry
    #[error("template not found: {id}")]
    NotFound { id: String },

    /// Duplicate template definition
    #[error("duplicate template definition: {id}")]
    Duplicate { id: String },

    /// A template extends an id nobody defines
    #[error("template {template} extends unknown template {parent}")]
    UnknownParent { template: String, parent: String },

    /// Circular `extends` chain
    #[error("circular template reference detected: {chain}")]
    CircularReference { chain: String },

    /// A `merge_*` flag that is not a boolean
    #[error("merge flag {field} of template {template} must be a boolean")]
    MalformedMergeFlag { template: String, field: String },

    /// A field whose value has the wrong shape
    #[error("invalid field {field} in template {template}: {message}")]
    InvalidField {
        template: String,
        field: String,
        message: String,
    },
}

impl TemplateError {
    /// The template the error is about
    pub fn template(&self) -> &str {
        match self {
            Self::NotFound { id } | Self::Duplicate { id } => id,
            Self::UnknownParent { template, .. }
            | Self::MalformedMergeFlag { template, .. }
            | Self::InvalidField { template, .. } => template,
            Self::CircularReference { chain } => chain.split(" -> ").next().unwrap_or(chain),
        }
    }
}

/// Source of raw template definitions
///
/// `generation` must change whenever any definition changes; caches compare it
/// to decide when to drop what they hold.
pub trait TemplateStore: Send + Sync {
    /// Get a definition by id
    fn definition(&self, id: &str) -> Option<Arc<TemplateDefinition>>;

    /// All known ids
    fn ids(&self) -> Vec<String>;

    /// Change counter
    fn generation(&self) -> u64;
}

impl<S: TemplateStore + ?Sized> TemplateStore for Arc<S> {
    fn definition(&self, id: &str) -> Option<Arc<TemplateDefinition>> {
        (**self).definition(id)
    }

    fn ids(&self) -> Vec<String> {
        (**self).ids()
    }

    fn generation(&self) -> u64 {
        (**self).generation()
    }
}

/// In-memory template store
///
/// Every mutation bumps the generation, which is how resolvers sharing the
/// registry learn that their caches are stale.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, Arc<TemplateDefinition>>>,
    generation: AtomicU64,
}

impl TemplateRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `definitions`
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = TemplateDefinition>,
    ) -> Result<Self, TemplateError> {
        let registry = Self::new();
        for def in definitions {
            registry.register(def)?;
        }
        Ok(registry)
    }

    /// Register a new template
    pub fn register(&self, def: TemplateDefinition) -> Result<(), TemplateError> {
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        if templates.contains_key(&def.id) {
            return Err(TemplateError::Duplicate { id: def.id });
        }
        templates.insert(def.id.clone(), Arc::new(def));
        self.bump();
        Ok(())
    }

    /// Insert or overwrite a template
    pub fn upsert(&self, def: TemplateDefinition) {
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        templates.insert(def.id.clone(), Arc::new(def));
        self.bump();
    }

    /// Remove a template, returning it if it existed
    pub fn remove(&self, id: &str) -> Option<Arc<TemplateDefinition>> {
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        let removed = templates.remove(id);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    /// Swap in a whole new set of definitions (hot reload)
    pub fn replace_all(
        &self,
        definitions: impl IntoIterator<Item = TemplateDefinition>,
    ) -> Result<(), TemplateError> {
        let mut fresh = HashMap::new();
        for def in definitions {
            if fresh.contains_key(&def.id) {
                return Err(TemplateError::Duplicate { id: def.id });
            }
            fresh.insert(def.id.clone(), Arc::new(def));
        }

        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        *templates = fresh;
        self.bump();
        Ok(())
    }

    /// Check if a template exists
    pub fn contains(&self, id: &str) -> bool {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

impl TemplateStore for TemplateRegistry {
    fn definition(&self, id: &str) -> Option<Arc<TemplateDefinition>> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}
