use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::lifecycle::{DerivationRules, Effect, Transition};
use crate::models::Bill;
use crate::store::BillStore;

/// Background job that keeps stored statuses current.
///
/// Status is derived on write, so a pending bill stays "pending" in storage
/// after its due date passes until something touches it. The sweeper polls
/// for those bills and runs them through the same derivation as any other
/// write.
pub struct OverdueSweeper<S> {
    store: S,

    /// Polling interval in seconds
    poll_interval_seconds: u64,

    /// Bills fetched per query
    batch_size: i64,

    /// Whether the sweeper is running (wrapped in Arc for sharing)
    running: Arc<RwLock<bool>>,
}

impl<S: BillStore> OverdueSweeper<S> {
    /// Creates a new sweeper.
    ///
    /// # Arguments
    ///
    /// * `store` - Bill storage
    /// * `poll_interval_seconds` - How often to sweep
    /// * `batch_size` - Maximum bills loaded per query
    pub fn new(store: S, poll_interval_seconds: u64, batch_size: i64) -> Self {
        Self {
            store,
            poll_interval_seconds,
            batch_size: batch_size.max(1),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Runs the sweep loop until stopped.
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn start(&self) -> Result<(), anyhow::Error> {
        *self.running.write().await = true;
        info!(
            "OverdueSweeper started with poll interval: {} seconds",
            self.poll_interval_seconds
        );

        while *self.running.read().await {
            match self.sweep(Utc::now().date_naive()).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Re-derived status of {} bill(s)", count);
                    }
                }
                Err(e) => {
                    error!("Error in sweeper loop: {}", e);
                }
            }

            sleep(Duration::from_secs(self.poll_interval_seconds)).await;
        }

        info!("OverdueSweeper stopped");
        Ok(())
    }

    /// Sets the running flag to false; the loop exits after the current tick.
    pub async fn stop(&self) {
        info!("Stopping OverdueSweeper...");
        *self.running.write().await = false;
    }

    /// Re-derives every stale pending bill as of `today`.
    ///
    /// Returns how many bills changed status. Batches are fetched until one
    /// comes back short or nothing in it could be updated.
    pub async fn sweep(&self, today: NaiveDate) -> Result<usize, anyhow::Error> {
        let mut changed = 0;
        loop {
            let batch = self.store.list_stale_pending(today, self.batch_size).await?;
            let fetched = batch.len();
            if fetched == 0 {
                break;
            }

            let mut progressed = 0;
            for bill in batch {
                match self.process_bill(bill, today).await {
                    Ok(true) => progressed += 1,
                    Ok(false) => {}
                    Err(e) => warn!("Skipping bill during sweep: {}", e),
                }
            }
            changed += progressed;

            if (fetched as i64) < self.batch_size || progressed == 0 {
                break;
            }
        }
        Ok(changed)
    }

    /// Re-derives one bill and stores only its new status.
    ///
    /// The write is conditional on the row still matching the snapshot, so a
    /// payment recorded after the batch was read is never overwritten; such a
    /// bill is skipped.
    async fn process_bill(&self, bill: Bill, today: NaiveDate) -> Result<bool, anyhow::Error> {
        let (status, effect) = DerivationRules::transition(&bill, today);
        if status == bill.status {
            return Ok(false);
        }
        let payment_date = (effect == Effect::StampPaymentDate).then_some(today);

        if !self
            .store
            .set_status_if_unchanged(&bill, status, payment_date)
            .await?
        {
            debug!(bill_id = %bill.id, "Bill changed since it was read, skipped");
            return Ok(false);
        }

        info!(
            bill_id = %bill.id,
            company_id = %bill.company_id,
            "Bill status {} -> {}", bill.status, status
        );
        Ok(true)
    }
}
