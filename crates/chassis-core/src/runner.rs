//! # Lifecycle Runner
//!
//! Executes one designated main task on the controlling task and any number
//! of background tasks as independently scheduled tokio tasks, then drains:
//!
//! ```text
//! Idle → RunningModules → RunningTasks → Draining → Stopped
//!            │                 │             │
//!            │ run hooks,      │ main task   │ one termination token per
//!            │ creation order  │ + N spawned │ background channel, then
//!            │                 │ tasks       │ fan-in over join handles
//! ```
//!
//! Every background task owns a capacity-1 termination channel. No token is
//! sent before the main task has fully returned, and cancellation is
//! cooperative: a task that never observes its channel keeps the runner in
//! `Draining` forever; the runner never force-kills anything.
//!
//! Background-task errors are logged, never propagated; the main task's
//! result is the run result.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::instance::{AppInstance, ShutdownHandle};

/// Termination token delivered to a background task during drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminate;

/// Receive side of a background task's termination channel.
pub type TerminationSignal = mpsc::Receiver<Terminate>;

/// Lifecycle states, observable through [`AppRunner::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Created, not yet running.
    Idle,
    /// Invoking module run hooks on the controlling task.
    RunningModules,
    /// Main task and background tasks executing.
    RunningTasks,
    /// Main task returned; signalling and awaiting background tasks.
    Draining,
    /// Terminal.
    Stopped,
}

type BackgroundFn =
    Box<dyn FnOnce(Arc<AppInstance>, TerminationSignal) -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Runs an application's lifecycle to completion.
pub struct AppRunner {
    app: Arc<AppInstance>,
    background: Vec<BackgroundFn>,
    main_timeout: Option<Duration>,
    state: watch::Sender<RunnerState>,
}

impl AppRunner {
    /// Create a runner for a fully-built instance.
    #[must_use]
    pub fn new(app: Arc<AppInstance>) -> Self {
        let (state, _) = watch::channel(RunnerState::Idle);
        Self {
            app,
            background: Vec::new(),
            main_timeout: None,
            state,
        }
    }

    /// Observe lifecycle state transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<RunnerState> {
        self.state.subscribe()
    }

    /// Add a background task. Tasks are signalled in the order they were
    /// added.
    #[must_use]
    pub fn background<F, Fut>(mut self, task: F) -> Self
    where
        F: FnOnce(Arc<AppInstance>, TerminationSignal) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.background
            .push(Box::new(move |app, signal| task(app, signal).boxed()));
        self
    }

    /// Attach a bounded duration to the main task. On expiry the main
    /// future is cancelled and the run proceeds exactly as if the main
    /// task had returned successfully.
    #[must_use]
    pub fn main_timeout(mut self, timeout: Duration) -> Self {
        self.main_timeout = Some(timeout);
        self
    }

    /// Run module hooks, the main task and all background tasks, then
    /// drain. Returns the main task's result.
    pub async fn run<F, Fut>(self, main_task: F) -> anyhow::Result<()>
    where
        F: FnOnce(Arc<AppInstance>, ShutdownHandle) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let Self {
            app,
            background,
            main_timeout,
            state,
        } = self;

        // ---------------------------------------------------------------------
        // RunningModules: run hooks in creation order, controlling task.
        // ---------------------------------------------------------------------
        state.send_replace(RunnerState::RunningModules);
        for module in app.config().modules() {
            let Some(run) = &module.run else { continue };
            let driver = app.driver_by_name(&module.name);
            debug!(module = %module.name, "Running module hook");
            if let Err(e) = run(&app, driver.as_ref()) {
                error!(module = %module.name, error = %e, "Module run hook failed, aborting");
                state.send_replace(RunnerState::Stopped);
                return Err(e);
            }
        }

        // ---------------------------------------------------------------------
        // RunningTasks: one termination channel per background task.
        // ---------------------------------------------------------------------
        state.send_replace(RunnerState::RunningTasks);
        let total = background.len();
        let mut signals = Vec::with_capacity(total);
        let mut handles = Vec::with_capacity(total);
        for (index, task) in background.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel(1);
            signals.push(tx);
            let future = task(Arc::clone(&app), rx);
            handles.push(tokio::spawn(future));
            debug!(task = index + 1, total, "Background task started");
        }

        let main_future = main_task(Arc::clone(&app), app.shutdown_handle());
        let main_result = match main_timeout {
            Some(limit) => match tokio::time::timeout(limit, main_future).await {
                Ok(result) => result,
                Err(_) => {
                    info!(timeout_ms = limit.as_millis() as u64, "Main task timeout expired");
                    Ok(())
                }
            },
            None => main_future.await,
        };
        match &main_result {
            Ok(()) => debug!("Main task returned"),
            Err(e) => error!(error = %e, "Main task failed"),
        }

        // ---------------------------------------------------------------------
        // Draining: fan out termination tokens, fan in completions. Only
        // entered once the main task has fully returned.
        // ---------------------------------------------------------------------
        state.send_replace(RunnerState::Draining);
        for (index, tx) in signals.iter().enumerate() {
            debug!(task = index + 1, total, "Signalling background task");
            if tx.send(Terminate).await.is_err() {
                debug!(task = index + 1, "Background task already finished");
            }
        }

        let mut remaining = total;
        for (index, handle) in handles.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(())) => debug!(task = index + 1, "Background task finished"),
                Ok(Err(e)) => error!(task = index + 1, error = %e, "Background task failed"),
                Err(e) => error!(task = index + 1, error = %e, "Background task panicked"),
            }
            remaining -= 1;
            debug!(remaining, "Awaiting background tasks");
        }

        state.send_replace(RunnerState::Stopped);
        info!("All tasks finished");
        main_result
    }
}
