//! # Chassis Demo
//!
//! Assembles a small application from the built-in modules:
//!
//! - `sys/logger` - console logging
//! - `sys/timer` - interval scheduling
//! - `demo/heartbeat` - app-local service module arming a heartbeat
//!   interval from its run hook (no driver of its own)
//! - `demo/cli` - descriptor that exists purely to register the demo's
//!   `--timeout-secs` flag
//!
//! A background task logs every heartbeat until it receives its
//! termination token; the main task waits for Ctrl+C (or the timeout).
//!
//! ```bash
//! chassis-demo --heartbeat.period-secs 2 --timeout-secs 10 --debug
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use chassis_core::{
    AppConfigBuilder, AppInstance, AppRunner, CapabilityType, InstanceBuilder, ModuleDescriptor,
    ModuleRegistry, TerminationSignal,
};
use chassis_modules::{logger, timer};

/// Tag carried by every heartbeat timer event.
const HEARTBEAT_TAG: u64 = 1;

/// Heartbeat service: no driver, arms the shared timer at run start.
fn heartbeat_descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("demo/heartbeat", CapabilityType::NetworkService)
        .requires([logger::MODULE_NAME, timer::MODULE_NAME])
        .with_configure(|schema| {
            schema.flag_u64("heartbeat.period-secs", 5, "Heartbeat period in seconds");
        })
        .with_run(|app, _| {
            let period = app.config().flag_u64("heartbeat.period-secs").unwrap_or(5);
            let driver = app.timer().context("timer module missing")?;
            let timer = driver.as_timer().context("driver lacks timer capability")?;
            timer.new_interval(Duration::from_secs(period), HEARTBEAT_TAG, true);
            info!(period_secs = period, "Heartbeat armed");
            Ok(())
        })
}

/// Flag-only descriptor for the demo's own options.
fn cli_descriptor() -> ModuleDescriptor {
    ModuleDescriptor::new("demo/cli", CapabilityType::None).with_configure(|schema| {
        schema.flag_u64(
            "timeout-secs",
            0,
            "Exit after this many seconds (0 = wait for interrupt)",
        );
    })
}

/// Background event loop over the timer subscription.
async fn event_loop(app: Arc<AppInstance>, mut signal: TerminationSignal) -> Result<()> {
    let driver = app.timer().context("timer module missing")?;
    let timer = driver.as_timer().context("driver lacks timer capability")?;
    let mut events = timer.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => info!(tag = event.tag, service = %app.service(), "Heartbeat"),
                Err(RecvError::Lagged(missed)) => warn!(missed, "Dropped heartbeats"),
                Err(RecvError::Closed) => break,
            },
            _ = signal.recv() => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut registry = ModuleRegistry::new();
    registry.register(logger::descriptor())?;
    registry.register(timer::descriptor())?;
    registry.register(heartbeat_descriptor())?;
    registry.register(cli_descriptor())?;

    let config = AppConfigBuilder::new(&registry)
        .with_app_name("chassis-demo")
        .with_service("demo")
        .with_modules(["demo/cli", "demo/heartbeat"])
        .with_args(std::env::args().skip(1))
        .build()?;

    let app = match InstanceBuilder::build(config) {
        Ok(app) => app,
        Err(failure) => {
            failure.partial.close();
            return Err(failure.error.into());
        }
    };

    let mut runner = AppRunner::new(Arc::clone(&app)).background(event_loop);
    if let Some(secs) = app.config().flag_u64("timeout-secs").filter(|&s| s > 0) {
        runner = runner.main_timeout(Duration::from_secs(secs));
    }

    let result = runner
        .run(|app, _shutdown| async move {
            info!(instance = %app.id(), "Running; press Ctrl+C to stop");
            app.wait_for_shutdown().await;
            Ok(())
        })
        .await;

    app.close();
    result
}
