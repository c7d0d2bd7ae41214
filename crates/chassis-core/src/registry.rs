//! # Module Registry
//!
//! Process-wide catalog of module descriptors. The registry is an explicit
//! object constructed once at process start, populated before any
//! application is built, and read-only thereafter: registration must reach
//! quiescence before the first resolution call, so resolution reads need no
//! locking discipline beyond that ordering guarantee.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ChassisError, ChassisResult};
use crate::module::ModuleDescriptor;

/// Append-only catalog of module descriptors.
#[derive(Default)]
pub struct ModuleRegistry {
    /// Descriptors in registration order.
    modules: Vec<Arc<ModuleDescriptor>>,
    /// Name index into `modules`.
    index: HashMap<String, usize>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// Fails with [`ChassisError::DuplicateName`] if a descriptor with the
    /// same name already exists. Registering two descriptors with the same
    /// name is a fatal registration error, never a runtime condition.
    pub fn register(&mut self, descriptor: ModuleDescriptor) -> ChassisResult<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(ChassisError::DuplicateName {
                module: descriptor.name,
            });
        }

        debug!(
            module = %descriptor.name,
            capability = %descriptor.capability,
            requires = ?descriptor.requires,
            "Registering module"
        );

        self.index
            .insert(descriptor.name.clone(), self.modules.len());
        self.modules.push(Arc::new(descriptor));
        Ok(())
    }

    /// Look up a descriptor by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// True when nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Registered module names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }
}
