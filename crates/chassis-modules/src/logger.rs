//! # Console Logger Module
//!
//! Owns the process-wide `tracing` subscriber. Registers `--log-level` and
//! `--log-json`; the base `--debug`/`--verbose` flags upgrade the level
//! filter the same way the rest of the framework expects:
//!
//! | flags               | filter          |
//! |---------------------|-----------------|
//! | `--debug --verbose` | `trace`         |
//! | `--debug`           | `debug`         |
//! | (neither)           | `--log-level`   |
//!
//! Installation is tolerant of an already-installed subscriber so that
//! several applications (or tests) can share one process.

use std::sync::Arc;

use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

use chassis_core::{AppInstance, CapabilityType, Driver, DriverError, LogApi, ModuleDescriptor};

/// Name under which the logger module registers.
pub const MODULE_NAME: &str = "sys/logger";

/// Driver handle for the installed subscriber.
pub struct LoggerDriver {
    level: Level,
    json: bool,
}

impl LoggerDriver {
    fn install(filter: &str, json: bool) -> anyhow::Result<Self> {
        // RUST_LOG overrides the flag-derived filter.
        let env_filter =
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(filter))?;

        let installed = if json {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .try_init()
        };
        if installed.is_err() {
            debug!("Subscriber already installed, keeping the existing one");
        }

        Ok(Self {
            level: filter.parse::<Level>().unwrap_or(Level::INFO),
            json,
        })
    }
}

impl LogApi for LoggerDriver {
    fn level(&self) -> Level {
        self.level
    }

    fn json(&self) -> bool {
        self.json
    }
}

impl Driver for LoggerDriver {
    fn close(&self) -> Result<(), DriverError> {
        // The global subscriber cannot be uninstalled; nothing to release.
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_log(&self) -> Option<&dyn LogApi> {
        Some(self)
    }
}

fn construct(app: &AppInstance) -> anyhow::Result<Arc<dyn Driver>> {
    let config = app.config();
    let filter = if config.debug() && config.verbose() {
        "trace".to_string()
    } else if config.debug() {
        "debug".to_string()
    } else {
        config.flag_str("log-level").unwrap_or("info").to_string()
    };
    let json = config.flag_bool("log-json");

    let driver = LoggerDriver::install(&filter, json)?;
    Ok(Arc::new(driver))
}

/// The logger module descriptor.
#[must_use]
pub fn descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new(MODULE_NAME, CapabilityType::Logger)
        .with_configure(|schema| {
            schema.flag_str(
                "log-level",
                "info",
                "Log level filter (trace|debug|info|warn|error)",
            );
            schema.flag_bool("log-json", "Structured JSON log output");
        })
        .with_construct(construct)
}
