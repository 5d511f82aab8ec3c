//! Background workers draining the notification queue
//!
//! Each worker claims one notification at a time, runs reconciliation to completion and
//! then completes the message. A failed run still completes its message: the cursor was
//! not advanced, so the next notification for the subscription covers the same range.

use notification_queue::NotificationConsumer;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::WorkerConfig;
use crate::engine::ReconciliationEngine;
use crate::error::{EngineError, Result};

/// A pool of tasks consuming the notification queue.
///
/// # Shutdown
///
/// Shutdown is signalled between runs; a run in progress is allowed to finish. The pool
/// waits up to `shutdown_timeout` and then aborts whatever is still running.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_timeout: std::time::Duration,
}

impl WorkerPool {
    /// Prepare the queue and spawn the workers.
    ///
    /// Messages left in flight by a previous process are made visible again before any
    /// worker starts.
    pub async fn start(
        engine: Arc<ReconciliationEngine>,
        consumer: NotificationConsumer,
        config: WorkerConfig,
    ) -> Result<Self> {
        config.validate()?;

        let recovered = consumer.prepare().await?;
        if recovered > 0 {
            tracing::info!(
                "Redelivering {} notification(s) left unfinished on {}",
                recovered,
                consumer.queue()
            );
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = (0..config.workers)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    engine.clone(),
                    consumer.clone(),
                    config.poll_interval,
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        tracing::info!(
            "Started {} worker(s) on queue {}",
            config.workers,
            consumer.queue()
        );

        Ok(Self {
            workers,
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop the workers, waiting for in-progress runs up to the configured timeout.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        let aborts: Vec<_> = self.workers.iter().map(|w| w.abort_handle()).collect();
        let joined = join_workers(self.workers);

        match timeout(self.shutdown_timeout, joined).await {
            Ok(results) => {
                let panicked = results.iter().filter(|r| r.is_err()).count();
                if panicked > 0 {
                    return Err(EngineError::Shutdown(format!(
                        "{panicked} worker(s) panicked"
                    )));
                }
                tracing::info!("Worker pool shut down");
                Ok(())
            }
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                Err(EngineError::Shutdown(format!(
                    "Workers did not stop within {:?}",
                    self.shutdown_timeout
                )))
            }
        }
    }
}

async fn join_workers(
    handles: Vec<JoinHandle<()>>,
) -> Vec<std::result::Result<(), tokio::task::JoinError>> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await);
    }
    results
}

/// Main loop of one worker
async fn run_worker(
    id: usize,
    engine: Arc<ReconciliationEngine>,
    consumer: NotificationConsumer,
    poll_interval: std::time::Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!("Worker {} started", id);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        match consumer.next().await {
            Ok(Some(delivery)) => {
                tracing::debug!(
                    "Worker {} processing message {} (attempt {})",
                    id,
                    delivery.message.id,
                    delivery.message.dequeue_count
                );
                engine.process_notification(&delivery.notification).await;
                if let Err(e) = consumer.complete(&delivery).await {
                    tracing::warn!(
                        "Worker {} failed to complete message {}: {}",
                        id,
                        delivery.message.id,
                        e
                    );
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Worker {} failed to read from {}: {}", id, consumer.queue(), e);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            changed = shutdown_rx.changed() => {
                // The pool was dropped without a shutdown.
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Worker {} stopped", id);
}
