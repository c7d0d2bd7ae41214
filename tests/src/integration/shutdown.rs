//! # Drain and Cooperative-Cancellation Tests
//!
//! The shutdown protocol across real instances: fan-out only after the
//! main task returns, fan-in over every background task, and no forced
//! cancellation ever.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use chassis_core::{
        AppConfigBuilder, AppInstance, AppRunner, InstanceBuilder, ModuleRegistry, RunnerState,
    };

    fn empty_app() -> Arc<AppInstance> {
        let registry = ModuleRegistry::new();
        let config = AppConfigBuilder::new(&registry).build().unwrap();
        InstanceBuilder::build(config).unwrap()
    }

    #[tokio::test]
    async fn test_zero_signals_until_main_return_recorded() {
        let app = empty_app();
        let main_returned = Arc::new(AtomicBool::new(false));
        let signals_before_return = Arc::new(AtomicUsize::new(0));

        let mut runner = AppRunner::new(Arc::clone(&app));
        for _ in 0..4 {
            let main_returned = Arc::clone(&main_returned);
            let early = Arc::clone(&signals_before_return);
            runner = runner.background(move |_, mut signal| async move {
                let _ = signal.recv().await;
                if !main_returned.load(Ordering::SeqCst) {
                    early.fetch_add(1, Ordering::SeqCst);
                }
                Ok(())
            });
        }

        let flag = Arc::clone(&main_returned);
        runner
            .run(move |_, _| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(
            signals_before_return.load(Ordering::SeqCst),
            0,
            "no task may observe a token before the main task returned"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncooperative_task_blocks_drain() {
        let app = empty_app();
        let runner = AppRunner::new(app).background(|_, signal| async move {
            // Keeps the receiver alive but never reads it.
            let _signal = signal;
            futures::future::pending::<()>().await;
            Ok(())
        });
        let mut state = runner.state();

        let outcome =
            tokio::time::timeout(Duration::from_secs(30), runner.run(|_, _| async { Ok(()) }))
                .await;
        assert!(outcome.is_err(), "drain must wait forever, not time out");
        assert_eq!(*state.borrow_and_update(), RunnerState::Draining);
    }

    #[tokio::test]
    async fn test_in_process_request_ends_waiting_main() {
        let app = empty_app();

        let result = AppRunner::new(Arc::clone(&app))
            .background(|app, mut signal| async move {
                // Decide to stop the application from a background task.
                tokio::time::sleep(Duration::from_millis(20)).await;
                app.request_shutdown();
                let _ = signal.recv().await;
                Ok(())
            })
            .run(|app, _| async move {
                app.wait_for_shutdown().await;
                Ok(())
            })
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_main_timeout_follows_normal_drain() {
        let app = empty_app();
        let drained = Arc::new(AtomicBool::new(false));
        let drained_flag = Arc::clone(&drained);

        let result = AppRunner::new(app)
            .main_timeout(Duration::from_millis(200))
            .background(move |_, mut signal| async move {
                let _ = signal.recv().await;
                drained_flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .run(|app, _| async move {
                // Waits far longer than the attached timeout.
                app.wait_for_shutdown_or_timeout(Duration::from_secs(3600))
                    .await;
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert!(drained.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_all_background_tasks_joined_despite_errors() {
        let app = empty_app();
        let finished = Arc::new(AtomicUsize::new(0));

        let mut runner = AppRunner::new(app);
        for index in 0..3usize {
            let finished = Arc::clone(&finished);
            runner = runner.background(move |_, mut signal| async move {
                let _ = signal.recv().await;
                finished.fetch_add(1, Ordering::SeqCst);
                if index == 1 {
                    anyhow::bail!("task {index} failed on purpose");
                }
                Ok(())
            });
        }

        let result = runner.run(|_, _| async { Ok(()) }).await;
        assert!(result.is_ok(), "background errors never become the run result");
        assert_eq!(finished.load(Ordering::SeqCst), 3, "drain joins every task");
    }
}
