//! # Chassis Core - Module Registry, Dependency Resolver and Lifecycle Orchestrator
//!
//! Independent capability modules (hardware drivers, loggers, network
//! services) register themselves with declared dependencies; an application
//! assembles, starts, runs and tears down only the modules it needs, in
//! dependency-correct order.
//!
//! ## Data Flow
//!
//! Strictly downward:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │   Registry   │──→│   Resolver   │──→│ Config Builder │
//! └──────────────┘   └──────────────┘   └───────┬────────┘
//!                                               │
//!        ┌──────────────────────────────────────┘
//!        ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Instance   │──→│   Lifecycle  │──→│   Teardown   │
//! │   Builder    │   │    Runner    │   │  (reverse)   │
//! └──────────────┘   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! registry.register(logger::descriptor())?;
//! registry.register(
//!     ModuleDescriptor::new("sensor", CapabilityType::Other)
//!         .requires(["logger"])
//!         .with_construct(|app| Ok(Arc::new(Sensor::open(app)?))),
//! )?;
//!
//! let config = AppConfigBuilder::new(&registry)
//!     .with_modules(["sensor"])
//!     .with_args(std::env::args().skip(1))
//!     .build()?;
//! let app = InstanceBuilder::build(config)?;
//!
//! AppRunner::new(Arc::clone(&app))
//!     .background(|app, signal| sensor_loop(app, signal))
//!     .run(|app, _| async move { app.wait_for_shutdown().await; Ok(()) })
//!     .await?;
//! app.close();
//! ```
//!
//! ## Concurrency Model
//!
//! One controlling task runs configuration, construction, module run hooks
//! and the main task. Background tasks are independently scheduled tokio
//! tasks sharing the instance by `Arc`; the lookup tables are fully
//! populated before any task starts and never mutated until teardown, so
//! task-side reads take a lock only for the duration of the map access.
//! Shutdown is cooperative: per-task termination channels, fan-out after
//! the main task returns, fan-in over join handles.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod builder;
pub mod config;
pub mod error;
pub mod instance;
pub mod module;
pub mod registry;
pub mod resolve;
pub mod runner;

// Re-export main types
pub use builder::{BuildError, InstanceBuilder};
pub use config::{AppConfig, AppConfigBuilder, OptionsSchema};
pub use error::{ChassisError, ChassisResult, DriverError};
pub use instance::{AppInstance, ShutdownHandle};
pub use module::{
    CapabilityType, ConfigureFn, ConstructFn, Driver, LogApi, ModuleDescriptor, RunFn, TimerApi,
    TimerEvent,
};
pub use registry::ModuleRegistry;
pub use runner::{AppRunner, RunnerState, Terminate, TerminationSignal};

/// Default service name when an application does not set one.
pub const DEFAULT_SERVICE: &str = "chassis";

/// Buffered events per capability broadcast subscriber before lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
