//! # Chassis Built-in Modules
//!
//! Leaf modules shipped with the framework, expressed through its own
//! contracts:
//!
//! - [`logger`] - console logging sink owning the process-wide `tracing`
//!   subscriber (capability `Logger`)
//! - [`timer`] - one-shot and interval scheduling over a broadcast channel
//!   (capability `Timer`)
//!
//! Each module exposes a `descriptor()` for explicit registration:
//!
//! ```rust,ignore
//! let mut registry = ModuleRegistry::new();
//! registry.register(chassis_modules::logger::descriptor())?;
//! registry.register(chassis_modules::timer::descriptor())?;
//! ```

pub mod logger;
pub mod timer;

pub use logger::LoggerDriver;
pub use timer::TimerDriver;
