//! # End-to-End Lifecycle Tests
//!
//! The full pipeline on a three-module dependency chain:
//!
//! ```text
//! [Registry] ──resolve(["sensor"])──→ ["logger", "bus", "sensor"]
//!      │
//!      ▼
//! [Config Builder] ──configure hooks, parse argv──→ AppConfig
//!      │
//!      ▼
//! [Instance Builder] ──construct in order──→ AppInstance
//!      │
//!      ▼
//! [Runner] ──main + background, drain──→ result
//!      │
//!      ▼
//! [Teardown] ──close sensor, bus, logger──→ released
//! ```

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use chassis_core::{
        AppConfigBuilder, AppRunner, CapabilityType, ChassisError, Driver, DriverError,
        InstanceBuilder, ModuleDescriptor, ModuleRegistry,
    };
    use chassis_modules::{logger, timer};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Driver that records its close into a shared journal.
    struct JournalingDriver {
        name: &'static str,
        journal: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Driver for JournalingDriver {
        fn close(&self) -> Result<(), DriverError> {
            self.journal.lock().push(self.name);
            Ok(())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    /// Registry with the logger → bus → sensor chain.
    fn sensor_chain(journal: &Arc<Mutex<Vec<&'static str>>>) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        for (name, capability, requires) in [
            ("logger", CapabilityType::Logger, Vec::new()),
            ("bus", CapabilityType::HardwareBus, vec!["logger"]),
            ("sensor", CapabilityType::Other, vec!["bus"]),
        ] {
            let journal = Arc::clone(journal);
            registry
                .register(
                    ModuleDescriptor::new(name, capability)
                        .requires(requires)
                        .with_construct(move |_| {
                            Ok(Arc::new(JournalingDriver {
                                name,
                                journal: Arc::clone(&journal),
                            }) as Arc<dyn Driver>)
                        }),
                )
                .unwrap();
        }
        registry
    }

    // =============================================================================
    // END-TO-END SCENARIOS
    // =============================================================================

    #[tokio::test]
    async fn test_full_lifecycle_sensor_chain() {
        let journal: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let registry = sensor_chain(&journal);

        // Resolution pulls the whole chain from one request.
        let resolved = registry.resolve(["sensor"]).unwrap();
        let order: Vec<&str> = resolved.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(order, vec!["logger", "bus", "sensor"]);

        let config = AppConfigBuilder::new(&registry)
            .with_modules(["sensor"])
            .build()
            .unwrap();
        let app = InstanceBuilder::build(config).unwrap();
        assert_eq!(app.constructed(), vec!["logger", "bus", "sensor"]);

        // One background task decrementing a counter on its signal; the
        // main task returns immediately.
        let counter = Arc::new(AtomicUsize::new(1));
        let task_counter = Arc::clone(&counter);
        AppRunner::new(Arc::clone(&app))
            .background(move |_, mut signal| async move {
                let _ = signal.recv().await;
                task_counter.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .run(|_, _| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        // Teardown in exact reverse creation order.
        app.close();
        assert_eq!(*journal.lock(), vec!["sensor", "bus", "logger"]);
    }

    #[tokio::test]
    async fn test_builtin_modules_full_pipeline() {
        let mut registry = ModuleRegistry::new();
        registry.register(logger::descriptor()).unwrap();
        registry.register(timer::descriptor()).unwrap();

        let config = AppConfigBuilder::new(&registry)
            .with_modules([timer::MODULE_NAME, logger::MODULE_NAME])
            .with_args(["--log-level", "warn"])
            .with_service("pipeline-test")
            .build()
            .unwrap();
        let app = InstanceBuilder::build(config).unwrap();

        assert_eq!(app.service(), "pipeline-test");

        // Capability queries answer through the by-type table.
        let log_driver = app.log().expect("logger constructed");
        assert!(log_driver.as_log().is_some());
        let timer_driver = app.timer().expect("timer constructed");
        assert!(timer_driver.as_timer().is_some());

        // Reserved-name lookup resolves by capability, not module name.
        assert!(app.module_instance("logger").is_some());
        assert!(app.module_instance("timer").is_some());

        // Background task counts timer ticks until told to stop.
        let ticks = Arc::new(AtomicUsize::new(0));
        let task_ticks = Arc::clone(&ticks);
        AppRunner::new(Arc::clone(&app))
            .background(move |app, mut signal| async move {
                let driver = app.timer().expect("timer constructed");
                let timer = driver.as_timer().expect("timer capability");
                let mut events = timer.subscribe();
                timer.new_interval(Duration::from_millis(10), 42, true);
                loop {
                    tokio::select! {
                        event = events.recv() => {
                            if let Ok(event) = event {
                                assert_eq!(event.tag, 42);
                                task_ticks.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                        _ = signal.recv() => break,
                    }
                }
                Ok(())
            })
            .run(|_, _| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            })
            .await
            .unwrap();

        assert!(ticks.load(Ordering::SeqCst) >= 1, "interval should have fired");
        app.close();
    }

    #[test]
    fn test_cycle_is_rejected_end_to_end() {
        let mut registry = ModuleRegistry::new();
        registry
            .register(ModuleDescriptor::new("a", CapabilityType::Other).requires(["b"]))
            .unwrap();
        registry
            .register(ModuleDescriptor::new("b", CapabilityType::Other).requires(["a"]))
            .unwrap();

        let err = AppConfigBuilder::new(&registry)
            .with_modules(["a"])
            .build()
            .unwrap_err();
        assert!(matches!(err, ChassisError::CyclicDependency { .. }));
    }

    #[tokio::test]
    async fn test_run_result_reports_main_error() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let registry = sensor_chain(&journal);

        let config = AppConfigBuilder::new(&registry)
            .with_modules(["sensor"])
            .build()
            .unwrap();
        let app = InstanceBuilder::build(config).unwrap();

        let result = AppRunner::new(Arc::clone(&app))
            .run(|_, _| async { anyhow::bail!("sensor fault") })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "sensor fault");

        // A failed run still tears down cleanly.
        app.close();
        assert_eq!(*journal.lock(), vec!["sensor", "bus", "logger"]);
    }
}
