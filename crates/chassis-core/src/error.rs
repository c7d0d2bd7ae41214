//! Error types for the framework core.
//!
//! Registry, resolution, configuration and construction errors are fatal to
//! application startup and surface through this taxonomy. Task errors stay
//! opaque (`anyhow::Error`) because their meaning belongs to the module that
//! produced them.

use thiserror::Error;

use crate::module::CapabilityType;

/// Result alias used throughout the framework core.
pub type ChassisResult<T> = Result<T, ChassisError>;

/// Framework core errors.
#[derive(Debug, Error)]
pub enum ChassisError {
    /// A descriptor with this name is already registered, or a driver
    /// already occupies this name in the instance tables.
    #[error("duplicate module name '{module}'")]
    DuplicateName { module: String },

    /// Another driver already occupies this singleton capability type.
    #[error("duplicate capability type '{capability}' claimed by module '{module}'")]
    DuplicateType {
        module: String,
        capability: CapabilityType,
    },

    /// A requested or required module name is not in the registry.
    #[error("unknown module '{module}' (required by '{required_by}')")]
    UnknownModule {
        module: String,
        required_by: String,
    },

    /// The dependency graph contains a cycle.
    #[error("cyclic dependency: {cycle}")]
    CyclicDependency { cycle: String },

    /// The process argument vector did not parse against the accumulated
    /// options schema.
    #[error("invalid arguments: {message}")]
    InvalidArgument { message: String },

    /// A module's construct hook failed. Wraps the module's own error.
    #[error("failed to construct module '{module}'")]
    Construction {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Error returned by a driver's close operation.
///
/// Teardown collects these and logs them; it never escalates, because
/// teardown must visit every driver exactly once.
#[derive(Debug, Error)]
#[error("driver close failed: {reason}")]
pub struct DriverError {
    pub reason: String,
}

impl DriverError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
