//! # Application Instance
//!
//! The running application: one per process execution. Owns every
//! constructed driver through three views:
//!
//! - a by-name map for direct lookup,
//! - a by-type map for singleton-constrained capability types,
//! - a creation-order list that teardown walks in exact reverse.
//!
//! All three live behind a single `RwLock`. They are populated only during
//! construction (single controlling thread, dependency order), read-only
//! while tasks run, and drained at teardown; the lock is never held
//! across a driver call or any blocking wait.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{ChassisError, ChassisResult};
use crate::module::{CapabilityType, Driver, ModuleDescriptor};

/// Driver lookup tables. Taken out wholesale at teardown.
#[derive(Default)]
struct ModuleTables {
    by_name: HashMap<String, Arc<dyn Driver>>,
    by_type: HashMap<CapabilityType, Arc<dyn Driver>>,
    by_order: Vec<(String, Arc<dyn Driver>)>,
}

/// Send side of the instance's shutdown wait.
///
/// Handed to the main task; sending a request unblocks
/// [`AppInstance::wait_for_shutdown`] the same way a caught process
/// interrupt does.
#[derive(Clone)]
pub struct ShutdownHandle {
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    /// Request shutdown from inside the process.
    pub fn request(&self) {
        self.notify.notify_one();
    }
}

/// The running application instance.
pub struct AppInstance {
    id: Uuid,
    config: AppConfig,
    tables: RwLock<ModuleTables>,
    shutdown: Arc<Notify>,
    closed: AtomicBool,
}

impl AppInstance {
    pub(crate) fn new(config: AppConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            tables: RwLock::new(ModuleTables::default()),
            shutdown: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Unique id of this instance, carried in log fields.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The immutable application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Debugging mode flag.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.config.debug()
    }

    /// Verbose logging flag.
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.config.verbose()
    }

    /// Service name set from configuration.
    #[must_use]
    pub fn service(&self) -> &str {
        self.config.service()
    }

    // =========================================================================
    // DRIVER LOOKUP
    // =========================================================================

    /// Look up a driver by module name.
    ///
    /// Reserved capability names ("logger", "timer", "bus", "display",
    /// "surface") resolve through the by-type table first, so callers need
    /// not know which concrete module claimed the capability.
    #[must_use]
    pub fn module_instance(&self, name: &str) -> Option<Arc<dyn Driver>> {
        let tables = self.tables.read();
        if let Some(capability) = CapabilityType::from_alias(name) {
            if let Some(driver) = tables.by_type.get(&capability) {
                return Some(Arc::clone(driver));
            }
        }
        tables.by_name.get(name).map(Arc::clone)
    }

    /// Look up the driver occupying a singleton capability type.
    #[must_use]
    pub fn capability(&self, capability: CapabilityType) -> Option<Arc<dyn Driver>> {
        self.tables.read().by_type.get(&capability).map(Arc::clone)
    }

    /// The logger driver, if one was constructed. Answers
    /// [`Driver::as_log`].
    #[must_use]
    pub fn log(&self) -> Option<Arc<dyn Driver>> {
        self.capability(CapabilityType::Logger)
    }

    /// The timer driver, if one was constructed. Answers
    /// [`Driver::as_timer`].
    #[must_use]
    pub fn timer(&self) -> Option<Arc<dyn Driver>> {
        self.capability(CapabilityType::Timer)
    }

    /// The hardware bus driver, if one was constructed.
    #[must_use]
    pub fn hardware_bus(&self) -> Option<Arc<dyn Driver>> {
        self.capability(CapabilityType::HardwareBus)
    }

    /// The display driver, if one was constructed.
    #[must_use]
    pub fn display(&self) -> Option<Arc<dyn Driver>> {
        self.capability(CapabilityType::Display)
    }

    /// Exact by-name lookup, bypassing reserved aliases. The runner uses
    /// this to pair run hooks with their own module's driver.
    pub(crate) fn driver_by_name(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.tables.read().by_name.get(name).map(Arc::clone)
    }

    /// Module names in creation order.
    #[must_use]
    pub fn constructed(&self) -> Vec<String> {
        self.tables
            .read()
            .by_order
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Register a constructed driver under its module's name and, for
    /// singleton capability types, under its type.
    ///
    /// The driver joins the creation-order list *before* the duplicate
    /// checks, so a driver whose registration fails is still torn down
    /// with everything else. A failed registration leaves the by-name and
    /// by-type tables untouched.
    pub(crate) fn insert_driver(
        &self,
        module: &ModuleDescriptor,
        driver: Arc<dyn Driver>,
    ) -> ChassisResult<()> {
        let mut tables = self.tables.write();

        tables
            .by_order
            .push((module.name.clone(), Arc::clone(&driver)));

        // Defensive: unreachable while registry names are unique.
        if tables.by_name.contains_key(&module.name) {
            return Err(ChassisError::DuplicateName {
                module: module.name.clone(),
            });
        }
        if module.capability.is_singleton() && tables.by_type.contains_key(&module.capability) {
            return Err(ChassisError::DuplicateType {
                module: module.name.clone(),
                capability: module.capability,
            });
        }

        tables
            .by_name
            .insert(module.name.clone(), Arc::clone(&driver));
        if module.capability.is_singleton() {
            tables.by_type.insert(module.capability, driver);
        }
        Ok(())
    }

    // =========================================================================
    // SHUTDOWN SIGNALLING
    // =========================================================================

    /// Send side of the shutdown wait, for handing to the main task.
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            notify: Arc::clone(&self.shutdown),
        }
    }

    /// Request shutdown from inside the process, unblocking
    /// [`wait_for_shutdown`](Self::wait_for_shutdown).
    pub fn request_shutdown(&self) {
        debug!(instance = %self.id, "Shutdown requested");
        self.shutdown.notify_one();
    }

    /// Block until an interrupt/terminate signal is caught or an
    /// in-process shutdown request arrives.
    pub async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = self.shutdown.notified() => {
                debug!(instance = %self.id, "Shutdown wait unblocked by request");
            }
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => info!(instance = %self.id, "Interrupt signal caught"),
                    Err(e) => error!(instance = %self.id, error = %e, "Signal listener failed"),
                }
            }
        }
    }

    /// Like [`wait_for_shutdown`](Self::wait_for_shutdown) but bounded.
    /// Returns true when a signal or request arrived, false on timeout.
    pub async fn wait_for_shutdown_or_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait_for_shutdown())
            .await
            .is_ok()
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    /// Close every constructed driver in exact reverse creation order.
    ///
    /// Best-effort: a close failure is logged and iteration continues, so
    /// every driver is visited exactly once. Afterwards all lookup tables
    /// are cleared to release ownership. Idempotent; the second and later
    /// calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!(instance = %self.id, "Instance already closed");
            return;
        }

        // Take the tables out so no lock is held across driver calls.
        let tables = std::mem::take(&mut *self.tables.write());

        info!(
            instance = %self.id,
            drivers = tables.by_order.len(),
            "Closing application instance"
        );

        for (name, driver) in tables.by_order.iter().rev() {
            debug!(module = %name, "Closing driver");
            if let Err(e) = driver.close() {
                error!(module = %name, error = %e, "Driver close failed");
            }
        }
        // Dropping `tables` releases the by-name and by-type references.
    }
}

impl Drop for AppInstance {
    fn drop(&mut self) {
        // Safety net for partial builds the caller never saw; a normal
        // lifecycle has already closed and this is a no-op.
        self.close();
    }
}

impl fmt::Debug for AppInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppInstance")
            .field("id", &self.id)
            .field("debug", &self.debug())
            .field("verbose", &self.verbose())
            .field("service", &self.service())
            .field("modules", &self.constructed())
            .finish()
    }
}
