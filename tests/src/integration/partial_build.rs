//! # Partial-Build Contracts
//!
//! A failed build aborts immediately; the builder closes nothing itself and
//! hands the partially-built instance back for the caller to tear down.
//! Every driver that reached the creation-order list, including one whose
//! by-type registration lost a singleton race, is closed exactly once.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use chassis_core::{
        AppConfigBuilder, CapabilityType, ChassisError, Driver, DriverError, InstanceBuilder,
        ModuleDescriptor, ModuleRegistry,
    };

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

    fn journaling(
        name: &'static str,
        capability: CapabilityType,
        journal: &Arc<Mutex<Vec<&'static str>>>,
    ) -> ModuleDescriptor {
        let journal = Arc::clone(journal);
        ModuleDescriptor::new(name, capability).with_construct(move |_| {
            Ok(Arc::new(JournalingDriver {
                name,
                journal: Arc::clone(&journal),
            }) as Arc<dyn Driver>)
        })
    }

    #[test]
    fn test_mid_chain_failure_closes_only_earlier_drivers() {
        let journal: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry
            .register(journaling("logger", CapabilityType::Logger, &journal))
            .unwrap();
        registry
            .register(journaling("bus", CapabilityType::HardwareBus, &journal).requires(["logger"]))
            .unwrap();
        registry
            .register(
                ModuleDescriptor::new("sensor", CapabilityType::Other)
                    .requires(["bus"])
                    .with_construct(|_| anyhow::bail!("probe failed")),
            )
            .unwrap();

        let config = AppConfigBuilder::new(&registry)
            .with_modules(["sensor"])
            .build()
            .unwrap();
        let failure = InstanceBuilder::build(config).unwrap_err();

        assert!(matches!(
            failure.error,
            ChassisError::Construction { ref module, .. } if module == "sensor"
        ));
        assert!(
            journal.lock().is_empty(),
            "builder must not close anything itself"
        );

        failure.partial.close();
        assert_eq!(*journal.lock(), vec!["bus", "logger"]);
    }

    #[test]
    fn test_singleton_loser_is_torn_down_with_the_rest() {
        let journal: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry
            .register(journaling("display/primary", CapabilityType::Display, &journal))
            .unwrap();
        registry
            .register(journaling("display/shadow", CapabilityType::Display, &journal))
            .unwrap();

        let config = AppConfigBuilder::new(&registry)
            .with_modules(["display/primary", "display/shadow"])
            .build()
            .unwrap();
        let failure = InstanceBuilder::build(config).unwrap_err();
        assert!(matches!(
            failure.error,
            ChassisError::DuplicateType { ref module, capability }
                if module == "display/shadow" && capability == CapabilityType::Display
        ));

        // The winner still owns the capability slot.
        let winner = failure
            .partial
            .capability(CapabilityType::Display)
            .expect("winner registered");
        assert!(winner
            .as_any()
            .downcast_ref::<JournalingDriver>()
            .is_some_and(|d| d.name == "display/primary"));

        failure.partial.close();
        assert_eq!(*journal.lock(), vec!["display/shadow", "display/primary"]);
    }

    #[test]
    fn test_dropped_partial_build_still_closes() {
        let journal: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ModuleRegistry::new();
        registry
            .register(journaling("logger", CapabilityType::Logger, &journal))
            .unwrap();
        registry
            .register(
                ModuleDescriptor::new("broken", CapabilityType::Other)
                    .requires(["logger"])
                    .with_construct(|_| anyhow::bail!("nope")),
            )
            .unwrap();

        let config = AppConfigBuilder::new(&registry)
            .with_modules(["broken"])
            .build()
            .unwrap();
        let failure = InstanceBuilder::build(config).unwrap_err();
        drop(failure);

        assert_eq!(*journal.lock(), vec!["logger"]);
    }
}
