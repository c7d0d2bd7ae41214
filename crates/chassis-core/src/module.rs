//! # Module Descriptors
//!
//! A module is a pluggable capability: it declares a globally unique name,
//! a capability type, the modules it requires, and up to three hooks
//! (configure, construct, run). Descriptors are blueprints; the runtime
//! handle a module produces at construction time is a [`Driver`].
//!
//! ## Capability Queries
//!
//! The by-type lookup stores drivers behind the [`Driver`] contract. Instead
//! of a runtime type switch, retrieval performs a checked interface query:
//! a driver overrides the `as_*` method for each capability interface it
//! implements, and callers go through [`Driver::as_log`] /
//! [`Driver::as_timer`]. The interface set is closed and small.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::config::OptionsSchema;
use crate::error::DriverError;
use crate::instance::AppInstance;

/// Capability type tag for a module.
///
/// At most one driver per singleton-constrained type may exist in an
/// application instance; `NetworkService`, `NetworkClient`, `Other` and
/// `None` are exempt so that any number of services and clients can
/// coexist, addressed by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityType {
    /// Logging sink.
    Logger,
    /// Hardware bus (I2C, SPI and friends).
    HardwareBus,
    /// Physical or virtual display.
    Display,
    /// Graphics surface manager.
    GraphicsSurface,
    /// Time keeping and scheduling.
    Timer,
    /// Network-facing service. Not singleton-constrained.
    NetworkService,
    /// Network client. Not singleton-constrained.
    NetworkClient,
    /// Anything else. Not singleton-constrained.
    Other,
    /// No capability tag; the module exists for its hooks or its
    /// dependency edges. Not singleton-constrained.
    None,
}

impl CapabilityType {
    /// Get the capability name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Logger => "logger",
            Self::HardwareBus => "bus",
            Self::Display => "display",
            Self::GraphicsSurface => "surface",
            Self::Timer => "timer",
            Self::NetworkService => "service",
            Self::NetworkClient => "client",
            Self::Other => "other",
            Self::None => "none",
        }
    }

    /// Resolve a reserved capability name to its type.
    ///
    /// Only singleton-constrained capabilities have reserved names; a
    /// lookup for "service" or "client" would be ambiguous.
    #[must_use]
    pub fn from_alias(name: &str) -> Option<Self> {
        match name {
            "logger" => Some(Self::Logger),
            "bus" => Some(Self::HardwareBus),
            "display" => Some(Self::Display),
            "surface" => Some(Self::GraphicsSurface),
            "timer" => Some(Self::Timer),
            _ => Option::None,
        }
    }

    /// Whether at most one driver of this type may exist per instance.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        !matches!(
            self,
            Self::NetworkService | Self::NetworkClient | Self::Other | Self::None
        )
    }
}

impl fmt::Display for CapabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CAPABILITY INTERFACES
// =============================================================================

/// Logging capability interface.
///
/// The framework logs through `tracing`; the logger driver owns the
/// process-wide subscriber configuration and answers questions about it.
pub trait LogApi: Send + Sync {
    /// Effective maximum level of the installed subscriber.
    fn level(&self) -> tracing::Level;

    /// True when structured JSON output is active.
    fn json(&self) -> bool;
}

/// An event emitted by a timer schedule.
#[derive(Debug, Clone)]
pub struct TimerEvent {
    /// Caller-supplied tag identifying the schedule that fired.
    pub tag: u64,
    /// When the schedule fired.
    pub fired_at: Instant,
}

/// Time keeping capability interface.
pub trait TimerApi: Send + Sync {
    /// Schedule a one-shot timeout.
    fn new_timeout(&self, duration: Duration, tag: u64);

    /// Schedule a repeating interval, optionally firing immediately.
    fn new_interval(&self, period: Duration, tag: u64, immediately: bool);

    /// Subscribe to events from every schedule on this timer.
    fn subscribe(&self) -> broadcast::Receiver<TimerEvent>;
}

// =============================================================================
// DRIVER CONTRACT
// =============================================================================

/// Runtime handle produced by a module's construct hook.
///
/// A driver is exclusively owned by the application instance that
/// constructed it until teardown closes it. `close` must be safe to call
/// exactly once; the instance guarantees it is never called twice.
pub trait Driver: Send + Sync + 'static {
    /// Release the driver's resources.
    fn close(&self) -> Result<(), DriverError>;

    /// Concrete-type escape hatch for by-name lookups.
    fn as_any(&self) -> &dyn Any;

    /// Checked query for the logging capability interface.
    fn as_log(&self) -> Option<&dyn LogApi> {
        Option::None
    }

    /// Checked query for the timer capability interface.
    fn as_timer(&self) -> Option<&dyn TimerApi> {
        Option::None
    }
}

// =============================================================================
// HOOKS
// =============================================================================

/// Configuration hook: registers option definitions into the shared schema.
/// Side-effect only and infallible by contract.
pub type ConfigureFn = Box<dyn Fn(&mut OptionsSchema) + Send + Sync>;

/// Construction hook: builds the module's driver. Receives read access to
/// the partially-built instance so already-constructed dependencies can be
/// looked up by name or type.
pub type ConstructFn =
    Box<dyn Fn(&AppInstance) -> anyhow::Result<Arc<dyn Driver>> + Send + Sync>;

/// Run hook: invoked once per descriptor before any task starts, in
/// creation order, with the descriptor's driver if it constructed one.
pub type RunFn =
    Box<dyn Fn(&AppInstance, Option<&Arc<dyn Driver>>) -> anyhow::Result<()> + Send + Sync>;

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// Registered blueprint for a pluggable capability.
///
/// Immutable once registered. Built with the chainable constructors:
///
/// ```rust,ignore
/// ModuleDescriptor::new("linux/i2c", CapabilityType::HardwareBus)
///     .requires(["logger"])
///     .with_configure(|schema| schema.flag_u64("i2c.bus", 1, "I2C bus"))
///     .with_construct(|app| Ok(Arc::new(I2cDriver::open(app)?)))
/// ```
pub struct ModuleDescriptor {
    /// Globally unique module name.
    pub name: String,
    /// Capability type tag.
    pub capability: CapabilityType,
    /// Names of modules that must be constructed before this one.
    pub requires: Vec<String>,
    /// Optional configuration hook.
    pub configure: Option<ConfigureFn>,
    /// Optional construction hook.
    pub construct: Option<ConstructFn>,
    /// Optional run hook.
    pub run: Option<RunFn>,
}

impl ModuleDescriptor {
    /// Create a descriptor with no dependencies and no hooks.
    #[must_use]
    pub fn new(name: impl Into<String>, capability: CapabilityType) -> Self {
        Self {
            name: name.into(),
            capability,
            requires: Vec::new(),
            configure: Option::None,
            construct: Option::None,
            run: Option::None,
        }
    }

    /// Declare dependencies by module name.
    #[must_use]
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(names.into_iter().map(Into::into));
        self
    }

    /// Attach the configuration hook.
    #[must_use]
    pub fn with_configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut OptionsSchema) + Send + Sync + 'static,
    {
        self.configure = Some(Box::new(hook));
        self
    }

    /// Attach the construction hook.
    #[must_use]
    pub fn with_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AppInstance) -> anyhow::Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        self.construct = Some(Box::new(hook));
        self
    }

    /// Attach the run hook.
    #[must_use]
    pub fn with_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AppInstance, Option<&Arc<dyn Driver>>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        self.run = Some(Box::new(hook));
        self
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("requires", &self.requires)
            .field("configure", &self.configure.is_some())
            .field("construct", &self.construct.is_some())
            .field("run", &self.run.is_some())
            .finish()
    }
}
