//! # Application Configuration
//!
//! The configuration builder resolves the requested module set, lets every
//! resolved module register its command-line options into a shared schema,
//! then parses the process argument vector against the accumulated schema.
//! The result is an immutable [`AppConfig`] consumed exactly once by the
//! instance builder.
//!
//! Flag *syntax* is delegated to `clap`; the core only accumulates and
//! consumes the schema. Parse failures abort configuration before any
//! driver is constructed.

use std::sync::Arc;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use crate::error::{ChassisError, ChassisResult};
use crate::module::ModuleDescriptor;
use crate::registry::ModuleRegistry;
use crate::DEFAULT_SERVICE;

// =============================================================================
// OPTIONS SCHEMA
// =============================================================================

/// Mutable option schema passed to module configure hooks.
///
/// Hooks may register option definitions but must not fail; registration is
/// side-effect-only by contract.
pub struct OptionsSchema {
    command: Command,
}

impl OptionsSchema {
    fn new(app_name: &str) -> Self {
        Self {
            command: Command::new(app_name.to_string()).no_binary_name(true),
        }
    }

    /// Register a presence flag (`--name`), false unless given.
    pub fn flag_bool(&mut self, name: &str, help: &str) {
        self.push(
            Arg::new(name.to_string())
                .long(name.to_string())
                .action(ArgAction::SetTrue)
                .help(help.to_string()),
        );
    }

    /// Register an unsigned integer option with a default.
    pub fn flag_u64(&mut self, name: &str, default: u64, help: &str) {
        self.push(
            Arg::new(name.to_string())
                .long(name.to_string())
                .value_parser(clap::value_parser!(u64))
                .default_value(default.to_string())
                .help(help.to_string()),
        );
    }

    /// Register a string option with a default.
    pub fn flag_str(&mut self, name: &str, default: &str, help: &str) {
        self.push(
            Arg::new(name.to_string())
                .long(name.to_string())
                .default_value(default.to_string())
                .help(help.to_string()),
        );
    }

    fn push(&mut self, arg: Arg) {
        // Command::arg consumes self; swap through a placeholder.
        let command = std::mem::replace(&mut self.command, Command::new("schema"));
        self.command = command.arg(arg);
    }

    /// Parse an argument vector (without the binary name) against the
    /// accumulated schema.
    fn parse<I, S>(self, args: I) -> ChassisResult<ArgMatches>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command
            .try_get_matches_from(args.into_iter().map(Into::into))
            .map_err(|e| ChassisError::InvalidArgument {
                message: e.to_string(),
            })
    }
}

// =============================================================================
// APPLICATION CONFIGURATION
// =============================================================================

/// Immutable application configuration.
///
/// Holds the resolved module list, the parsed option values, and the base
/// settings every application carries.
pub struct AppConfig {
    modules: Vec<Arc<ModuleDescriptor>>,
    matches: ArgMatches,
    debug: bool,
    verbose: bool,
    service: String,
}

impl AppConfig {
    /// Resolved module list, dependency-first. This order becomes
    /// construction order.
    #[must_use]
    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    /// Debugging mode flag.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Verbose logging flag.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Service name for network-facing modules.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Read a presence flag. False for unregistered names.
    #[must_use]
    pub fn flag_bool(&self, name: &str) -> bool {
        self.matches
            .try_get_one::<bool>(name)
            .ok()
            .flatten()
            .copied()
            .unwrap_or(false)
    }

    /// Read an unsigned integer option.
    #[must_use]
    pub fn flag_u64(&self, name: &str) -> Option<u64> {
        self.matches.try_get_one::<u64>(name).ok().flatten().copied()
    }

    /// Read a string option.
    #[must_use]
    pub fn flag_str(&self, name: &str) -> Option<&str> {
        self.matches
            .try_get_one::<String>(name)
            .ok()
            .flatten()
            .map(String::as_str)
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("debug", &self.debug)
            .field("verbose", &self.verbose)
            .field("service", &self.service)
            .field(
                "modules",
                &self.modules.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

// =============================================================================
// CONFIGURATION BUILDER
// =============================================================================

/// Builds an [`AppConfig`] from a registry, a requested module set and the
/// process argument vector.
pub struct AppConfigBuilder<'r> {
    registry: &'r ModuleRegistry,
    requested: Vec<String>,
    args: Vec<String>,
    app_name: String,
    service: String,
}

impl<'r> AppConfigBuilder<'r> {
    /// Start a configuration for the given registry.
    #[must_use]
    pub fn new(registry: &'r ModuleRegistry) -> Self {
        Self {
            registry,
            requested: Vec::new(),
            args: Vec::new(),
            app_name: DEFAULT_SERVICE.to_string(),
            service: DEFAULT_SERVICE.to_string(),
        }
    }

    /// Request modules by name. Dependencies are pulled in automatically.
    #[must_use]
    pub fn with_modules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requested.extend(names.into_iter().map(Into::into));
        self
    }

    /// Supply the argument vector, without the binary name.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the application name shown in usage output.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Set the default service name. `--service` overrides it.
    #[must_use]
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    /// Resolve, run configure hooks in resolved order, parse arguments.
    ///
    /// Unknown or malformed arguments fail with
    /// [`ChassisError::InvalidArgument`] before any driver is constructed.
    pub fn build(self) -> ChassisResult<AppConfig> {
        let modules = self.registry.resolve(&self.requested)?;

        let mut schema = OptionsSchema::new(&self.app_name);
        schema.flag_bool("debug", "Set debugging mode");
        schema.flag_bool("verbose", "Verbose logging");
        schema.flag_str("service", &self.service, "Service name");

        for module in &modules {
            if let Some(configure) = &module.configure {
                debug!(module = %module.name, "Running configure hook");
                configure(&mut schema);
            }
        }

        let matches = schema.parse(self.args)?;

        let debug = matches.get_flag("debug");
        let verbose = matches.get_flag("verbose");
        let service = matches
            .get_one::<String>("service")
            .cloned()
            .unwrap_or(self.service);

        Ok(AppConfig {
            modules,
            matches,
            debug,
            verbose,
            service,
        })
    }
}
