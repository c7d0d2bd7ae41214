//! # Dependency Resolver
//!
//! Computes the ordered, duplicate-free, cycle-free closure of a requested
//! module set. The output is a topological order in which every module is
//! preceded by all of its dependencies; ties are broken by first-seen order
//! in declaration/request order, which makes the result deterministic.
//! That determinism matters: the resolved order directly becomes
//! construction order.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::error::{ChassisError, ChassisResult};
use crate::module::ModuleDescriptor;
use crate::registry::ModuleRegistry;

/// Name used for `required_by` when a module was requested directly rather
/// than pulled in as a dependency.
const REQUESTED: &str = "(requested)";

impl ModuleRegistry {
    /// Resolve a set of requested module names into construction order.
    ///
    /// Depth-first expansion from each requested name. Modules already in
    /// the resolved sequence are skipped, so multiple requesters of a
    /// shared dependency collapse to one occurrence. A name found on the
    /// active recursion stack fails with
    /// [`ChassisError::CyclicDependency`] naming the cycle; an
    /// unregistered name fails with [`ChassisError::UnknownModule`].
    pub fn resolve<I, S>(&self, requested: I) -> ChassisResult<Vec<Arc<ModuleDescriptor>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolution = Resolution {
            registry: self,
            resolved: Vec::new(),
            done: HashSet::new(),
            visiting: Vec::new(),
        };

        for name in requested {
            resolution.visit(name.as_ref(), REQUESTED)?;
        }

        debug!(
            order = ?resolution.resolved.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            "Resolved module closure"
        );

        Ok(resolution.resolved)
    }
}

/// Working state of one resolution pass.
struct Resolution<'r> {
    registry: &'r ModuleRegistry,
    /// Output sequence, dependency-first.
    resolved: Vec<Arc<ModuleDescriptor>>,
    /// Names already appended to `resolved`.
    done: HashSet<String>,
    /// Active recursion stack, used both for cycle detection and for
    /// naming the cycle in the error.
    visiting: Vec<String>,
}

impl Resolution<'_> {
    fn visit(&mut self, name: &str, required_by: &str) -> ChassisResult<()> {
        if self.done.contains(name) {
            return Ok(());
        }

        if let Some(position) = self.visiting.iter().position(|n| n == name) {
            let mut cycle: Vec<&str> = self.visiting[position..]
                .iter()
                .map(String::as_str)
                .collect();
            cycle.push(name);
            return Err(ChassisError::CyclicDependency {
                cycle: cycle.join(" -> "),
            });
        }

        let descriptor = match self.registry.lookup(name) {
            Some(descriptor) => Arc::clone(descriptor),
            None => {
                return Err(ChassisError::UnknownModule {
                    module: name.to_string(),
                    required_by: required_by.to_string(),
                })
            }
        };

        self.visiting.push(name.to_string());
        for dependency in &descriptor.requires {
            self.visit(dependency, name)?;
        }
        self.visiting.pop();

        self.done.insert(name.to_string());
        self.resolved.push(descriptor);
        Ok(())
    }
}
