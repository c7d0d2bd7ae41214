//! # Instance Builder
//!
//! Consumes an [`AppConfig`] and constructs one driver per module in
//! resolved order, injecting already-built dependencies through read access
//! to the partially-built instance. Construction strictly serializes on the
//! controlling thread; only the run phase is concurrent.
//!
//! ## Partial-build cleanup
//!
//! A failed build aborts immediately and does not retry. The builder never
//! closes previously constructed drivers itself: the error carries the
//! partially-built instance, and closing it (via [`AppInstance::close`]) is
//! the caller's responsibility. The instance also closes itself when the
//! last reference is dropped, so an ignored partial build cannot leak
//! drivers.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ChassisError;
use crate::instance::AppInstance;

/// A failed build, carrying the partially-built instance for teardown.
#[derive(Debug, Error)]
#[error("application build failed")]
pub struct BuildError {
    /// What went wrong.
    #[source]
    pub error: ChassisError,
    /// Everything constructed before the failure, in creation order.
    pub partial: Arc<AppInstance>,
}

/// Builds an [`AppInstance`] from an immutable configuration.
pub struct InstanceBuilder;

impl InstanceBuilder {
    /// Construct every module's driver in resolved order.
    ///
    /// Descriptors without a construct hook contribute no driver but keep
    /// their position in the order; they exist to carry hooks or
    /// dependency edges.
    pub fn build(config: AppConfig) -> Result<Arc<AppInstance>, BuildError> {
        info!(
            modules = config.modules().len(),
            service = %config.service(),
            "Building application instance"
        );

        let modules: Vec<_> = config.modules().to_vec();
        let instance = Arc::new(AppInstance::new(config));

        for module in &modules {
            let Some(construct) = &module.construct else {
                debug!(module = %module.name, "No construct hook, dependency position only");
                continue;
            };

            debug!(module = %module.name, capability = %module.capability, "Constructing driver");
            let driver = match construct(&instance) {
                Ok(driver) => driver,
                // The hook failed before producing a handle, so there is no
                // just-built driver to close here.
                Err(source) => {
                    return Err(BuildError {
                        error: ChassisError::Construction {
                            module: module.name.clone(),
                            source,
                        },
                        partial: instance,
                    })
                }
            };

            if let Err(error) = instance.insert_driver(module, driver) {
                return Err(BuildError {
                    error,
                    partial: instance,
                });
            }
        }

        info!(constructed = ?instance.constructed(), "Application instance ready");
        Ok(instance)
    }
}
