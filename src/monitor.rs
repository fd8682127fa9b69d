use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::classifier::{Availability, classify};
use crate::config::MonitorSettings;
use crate::fetcher::PageFetcher;
use crate::models::Product;
use crate::notifier::Notifier;
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sleep between ticks.
    pub check_interval: Duration,
    /// Sleep before retrying after a whole-tick failure.
    pub error_retry: Duration,
}

impl MonitorConfig {
    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            check_interval: Duration::from_secs(settings.check_interval_secs),
            error_retry: Duration::from_secs(settings.error_retry_secs),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            error_retry: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    NotRunning,
}

struct LoopControl {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// The monitoring engine. Owns the tick loop and its Stopped/Running state;
/// construct one at process start and hand references to every consumer.
///
/// `start` and `stop` serialize on an internal mutex, so concurrent callers
/// cannot race a second loop into existence. `status` reads an atomic flag
/// maintained by the loop task itself and never blocks.
pub struct MonitorEngine {
    store: ProductStore,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    control: Mutex<Option<LoopControl>>,
    running: Arc<AtomicBool>,
}

impl MonitorEngine {
    pub fn new(
        store: ProductStore,
        fetcher: Arc<dyn PageFetcher>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            config,
            control: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Begin the tick loop on a background task. Idempotent: a second call
    /// while running is a no-op.
    pub async fn start(&self) -> StartOutcome {
        let mut control = self.control.lock().await;
        if control.is_some() {
            tracing::debug!("monitoring already running");
            return StartOutcome::AlreadyRunning;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = LoopTask {
            store: self.store.clone(),
            fetcher: Arc::clone(&self.fetcher),
            notifier: Arc::clone(&self.notifier),
            config: self.config.clone(),
            running: Arc::clone(&self.running),
        };

        self.running.store(true, Ordering::SeqCst);
        let handle = tokio::spawn(task.run(shutdown_rx));
        *control = Some(LoopControl {
            shutdown: shutdown_tx,
            handle,
        });

        tracing::info!("monitoring started");
        StartOutcome::Started
    }

    /// Signal the loop to stop and wait for it to exit. In-flight checks are
    /// allowed to finish; no new check begins after the flag is set.
    pub async fn stop(&self) -> StopOutcome {
        let mut control = self.control.lock().await;
        let Some(LoopControl { shutdown, handle }) = control.take() else {
            tracing::debug!("monitoring not running");
            return StopOutcome::NotRunning;
        };

        let _ = shutdown.send(true);
        if handle.await.is_err() {
            tracing::error!("monitor loop task failed");
            self.running.store(false, Ordering::SeqCst);
        }

        tracing::info!("monitoring stopped");
        StopOutcome::Stopped
    }

    /// Current scheduler state. Safe to call concurrently with `start`/`stop`
    /// without blocking either.
    pub fn status(&self) -> EngineStatus {
        if self.running.load(Ordering::SeqCst) {
            EngineStatus::Running
        } else {
            EngineStatus::Stopped
        }
    }

    /// Ad hoc single-product check. Diagnostic only: no notification is sent
    /// and no product state is touched.
    pub async fn check_one(&self, product_id: i64) -> Result<Availability, StoreError> {
        let product = self.store.get(product_id).await?;
        let extracted = self
            .fetcher
            .fetch(&product.url, &product.selector)
            .await;

        Ok(classify(extracted.as_deref(), &product.expected_text))
    }
}

struct LoopTask {
    store: ProductStore,
    fetcher: Arc<dyn PageFetcher>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
    running: Arc<AtomicBool>,
}

impl LoopTask {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.config.check_interval.as_secs(),
            "monitor loop started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let wait = match self.run_tick(&shutdown).await {
                Ok(checked) => {
                    tracing::debug!(checked, "tick complete");
                    self.config.check_interval
                }
                Err(e) => {
                    // The loop never terminates on its own; a failed tick is
                    // retried after a shorter fallback sleep.
                    tracing::error!(error = %e, "tick failed");
                    self.config.error_retry
                }
            };

            if wait_for_shutdown(&mut shutdown, wait).await {
                break;
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::info!("monitor loop stopped");
    }

    /// One pass over the active set. Returns the number of products checked;
    /// errors out only when the active set itself cannot be read.
    async fn run_tick(&self, shutdown: &watch::Receiver<bool>) -> Result<usize, StoreError> {
        let products = self.store.list_active().await?;

        if products.is_empty() {
            tracing::debug!("no active products to monitor");
            return Ok(0);
        }

        tracing::info!(count = products.len(), "checking active products");

        let mut checked = 0;
        for product in &products {
            if *shutdown.borrow() {
                tracing::info!("shutdown requested, abandoning remainder of tick");
                break;
            }
            self.check_product(product).await;
            checked += 1;
        }

        Ok(checked)
    }

    /// Check a single product and apply the state machine. Every failure is
    /// contained here; one product can never abort the tick.
    async fn check_product(&self, product: &Product) {
        let extracted = self
            .fetcher
            .fetch(&product.url, &product.selector)
            .await;
        let availability = classify(extracted.as_deref(), &product.expected_text);

        // Record the attempt regardless of outcome
        if let Err(e) = self.store.update_last_checked(product.id, Utc::now()).await {
            tracing::warn!(product_id = product.id, error = %e, "failed to record check time");
        }

        match availability {
            Availability::InStock => {
                tracing::info!(product_id = product.id, name = %product.name, "back in stock");
                self.notify_and_deactivate(product).await;
            }
            Availability::OutOfStock => {
                tracing::debug!(product_id = product.id, name = %product.name, "still out of stock");
            }
            Availability::Indeterminate => {
                tracing::warn!(
                    product_id = product.id,
                    name = %product.name,
                    selector = %product.selector,
                    "could not read stock status, treating as not in stock"
                );
            }
        }
    }

    /// Dispatch the notification and, on success, append the record and then
    /// deactivate. The ordering matters: a crash between the two writes
    /// leaves a detectable state (notification logged, product still active)
    /// rather than a silently lost notification.
    async fn notify_and_deactivate(&self, product: &Product) {
        let delivered = self
            .notifier
            .dispatch(&product.email, &product.name, &product.url)
            .await;

        if !delivered {
            tracing::warn!(
                product_id = product.id,
                name = %product.name,
                "notification dispatch failed, will retry next tick"
            );
            return;
        }

        let message = format!("Stock notification sent to {}", product.email);
        if let Err(e) = self
            .store
            .append_notification(product.id, "email", &message)
            .await
        {
            tracing::error!(product_id = product.id, error = %e, "failed to record notification");
            return;
        }

        match self.store.deactivate(product.id).await {
            Ok(()) => {
                tracing::info!(product_id = product.id, name = %product.name, "monitoring complete")
            }
            Err(e) => {
                tracing::error!(product_id = product.id, error = %e, "failed to deactivate product")
            }
        }
    }
}

/// Cancellation-aware sleep. Returns `true` when shutdown was requested
/// before or during the wait.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>, wait: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(wait) => false,
        changed = shutdown.changed() => match changed {
            Ok(()) => *shutdown.borrow(),
            // Sender dropped; treat as shutdown
            Err(_) => true,
        },
    }
}
