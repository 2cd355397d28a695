//! # Worker application wiring and lifecycle.
//!
//! [`WorkerApp`] assembles the subsystem (connector, consumer, dispatcher,
//! worker-process pool) and runs it until a shutdown signal arrives:
//!
//! ### Flow
//! 1. Declare and bind both task queues.
//! 2. Register the dispatcher behind each routing key.
//! 3. Start one consume loop per queue.
//! 4. Block on SIGINT / SIGTERM / SIGQUIT.
//! 5. Tear down in order: stop intake, drain the dispatcher, close pools.

use std::sync::Arc;

use tracing::{error, info};

use crate::broker::{
    handler, BrokerConnector, EventPublisher, QueueConsumer, ROUTE_TASK, ROUTE_TASK_CANCELED,
    TASKS_EXCHANGE, TASK_QUEUE_MAX_PRIORITY,
};
use crate::config::Config;
use crate::dispatch::{PoolCommand, ProcessPool, TaskDispatcher};
use crate::error::RuntimeError;
use crate::store::StatusStore;
use crate::task::{TaskCancelled, TaskCreated};

/// The assembled job-processing worker.
pub struct WorkerApp {
    config: Config,
    connector: Arc<BrokerConnector>,
    consumer: Arc<QueueConsumer>,
    dispatcher: Arc<TaskDispatcher>,
}

impl WorkerApp {
    /// Wires the subsystem together; the worker-process pool starts here.
    pub fn new(config: Config, store: Arc<dyn StatusStore>) -> Result<Self, RuntimeError> {
        let connector = Arc::new(BrokerConnector::from_config(&config));
        let consumer = QueueConsumer::new(Arc::clone(&connector));
        let command = PoolCommand::job_worker()?;
        let pool = ProcessPool::spawn(config.workers, command)?;
        let dispatcher = Arc::new(TaskDispatcher::new(store, pool, &config));
        Ok(Self {
            config,
            connector,
            consumer,
            dispatcher,
        })
    }

    /// A publisher sharing this worker's broker pools, for the producing
    /// side of the task flow.
    pub fn publisher(&self) -> EventPublisher {
        EventPublisher::new(Arc::clone(&self.connector))
    }

    /// Runs the worker until a shutdown signal, then drains and exits.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.consumer
            .declare_queue(
                ROUTE_TASK,
                TASKS_EXCHANGE,
                true,
                Some(TASK_QUEUE_MAX_PRIORITY),
            )
            .await?;
        self.consumer
            .declare_queue(ROUTE_TASK_CANCELED, TASKS_EXCHANGE, true, None)
            .await?;

        let dispatcher = Arc::clone(&self.dispatcher);
        self.consumer
            .set_callback(
                ROUTE_TASK,
                handler(move |value| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move {
                        match serde_json::from_value::<TaskCreated>(value) {
                            Ok(event) => dispatcher.process_message(event).await,
                            Err(e) => error!(error = %e, "invalid task creation event"),
                        }
                    }
                }),
            )
            .await;

        let dispatcher = Arc::clone(&self.dispatcher);
        self.consumer
            .set_callback(
                ROUTE_TASK_CANCELED,
                handler(move |value| {
                    let dispatcher = Arc::clone(&dispatcher);
                    async move {
                        match serde_json::from_value::<TaskCancelled>(value) {
                            Ok(event) => dispatcher.cancel_task(event).await,
                            Err(e) => error!(error = %e, "invalid task cancellation event"),
                        }
                    }
                }),
            )
            .await;

        self.consumer
            .consume_multiple(
                &[ROUTE_TASK, ROUTE_TASK_CANCELED],
                self.config.prefetch_count(),
            )
            .await?;
        info!(workers = self.config.workers, "worker started");

        wait_for_shutdown_signal().await?;
        info!("shutdown signal received");

        self.consumer.stop_consuming().await;
        self.dispatcher.stop().await;
        self.connector.close();
        Ok(())
    }
}

/// Resolves when the process receives SIGINT, SIGTERM, or SIGQUIT.
async fn wait_for_shutdown_signal() -> Result<(), RuntimeError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let mut quit = signal(SignalKind::quit())?;

        tokio::select! {
            _ = interrupt.recv() => {}
            _ = terminate.recv() => {}
            _ = quit.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}
