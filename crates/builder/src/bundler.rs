// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

use std::{sync::Arc, time::{Duration, Instant}};

use anyhow::Context;
use ethers::types::{Address, H256};
use hopper_modules::{relay::TX_HASH_DATA_KEY, BatchHandlerContext, BatchPipeline};
use hopper_pool::Mempool;
use hopper_provider::{GetBaseFee, GetGasTip};
use tokio::{
    sync::{mpsc, oneshot},
    time,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// A request to force one bundler iteration outside the normal cadence.
/// The responder receives the submitted transaction hash, if any batch was
/// sent.
pub struct SendBundleRequest {
    /// Channel on which the iteration outcome is returned
    pub responder: oneshot::Sender<anyhow::Result<Option<H256>>>,
}

/// Cloneable handle for forcing bundler iterations.
#[derive(Clone)]
pub struct BundlerHandle {
    sender: mpsc::Sender<SendBundleRequest>,
}

impl BundlerHandle {
    /// Force one bundler iteration over every entry point and return the
    /// first submitted transaction hash, if any.
    pub async fn send_bundle_now(&self) -> anyhow::Result<Option<H256>> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(SendBundleRequest { responder })
            .await
            .context("bundler loop is not running")?;
        receiver.await.context("bundler loop dropped the request")?
    }
}

/// Create the channel pair connecting a [`BundlerHandle`] to a running
/// [`Bundler`].
pub fn manual_bundle_channel() -> (BundlerHandle, mpsc::Receiver<SendBundleRequest>) {
    let (sender, receiver) = mpsc::channel(4);
    (BundlerHandle { sender }, receiver)
}

/// Controls the end to end process of creating a batch of user operations
/// from the pool and sending it to the entry point.
pub struct Bundler {
    mempool: Arc<Mempool>,
    pipeline: BatchPipeline,
    chain_id: u64,
    supported_entry_points: Vec<Address>,
    base_fee: Arc<dyn GetBaseFee>,
    gas_tip: Arc<dyn GetGasTip>,
    max_batch: usize,
    poll_interval: Duration,
}

impl Bundler {
    /// Create a bundler over the given pool and batch pipeline.
    ///
    /// `max_batch` caps operations per bundle; zero means unlimited.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mempool: Arc<Mempool>,
        pipeline: BatchPipeline,
        chain_id: u64,
        supported_entry_points: Vec<Address>,
        base_fee: Arc<dyn GetBaseFee>,
        gas_tip: Arc<dyn GetGasTip>,
        max_batch: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            mempool,
            pipeline,
            chain_id,
            supported_entry_points,
            base_fee,
            gas_tip,
            max_batch,
            poll_interval,
        }
    }

    /// Run one iteration for a single entry point: pull a candidate batch,
    /// run the batch pipeline, then remove from the pool the union of the
    /// post-pipeline batch (now-included ops) and pending removals.
    ///
    /// Returns `None` when the pool had nothing for this entry point.
    pub async fn process(&self, entry_point: Address) -> anyhow::Result<Option<BatchHandlerContext>> {
        let start = Instant::now();

        let mut batch = self.mempool.bundle_ops(entry_point);
        if batch.is_empty() {
            return Ok(None);
        }
        if self.max_batch > 0 && batch.len() > self.max_batch {
            batch.truncate(self.max_batch);
        }

        let base_fee = self
            .base_fee
            .get_base_fee()
            .await
            .context("failed to fetch base fee")?;
        let tip = self
            .gas_tip
            .get_gas_tip()
            .await
            .context("failed to fetch gas tip")?;

        let mut ctx = BatchHandlerContext::new(&batch, entry_point, self.chain_id, base_fee, tip);
        self.pipeline.run(&mut ctx).await?;

        let mut processed = ctx.batch.clone();
        processed.extend(ctx.pending_removal.iter().cloned());
        self.mempool
            .remove_ops(entry_point, &processed)
            .context("failed to reconcile pool after bundling")?;

        let included: Vec<H256> = ctx
            .batch
            .iter()
            .map(|op| op.hash(entry_point, self.chain_id))
            .collect();
        let dropped: Vec<H256> = ctx
            .pending_removal
            .iter()
            .map(|op| op.hash(entry_point, self.chain_id))
            .collect();
        info!(
            entry_point = ?entry_point,
            chain_id = self.chain_id,
            duration_ms = start.elapsed().as_millis() as u64,
            batch_userop_hashes = ?included,
            dropped_userop_hashes = ?dropped,
            data = ?ctx.data,
            "bundler run ok"
        );
        BundlerMetrics::record_run(included.len(), dropped.len());

        Ok(Some(ctx))
    }

    // One pass over every entry point, in the configured order. A failure for
    // one entry point is logged and must not starve the others.
    async fn run_once(&self) {
        for &entry_point in &self.supported_entry_points {
            if let Err(error) = self.process(entry_point).await {
                error!(
                    entry_point = ?entry_point,
                    chain_id = self.chain_id,
                    error = ?error,
                    "bundler run error"
                );
            }
        }
    }

    // A forced iteration, reporting the first submitted tx hash.
    async fn send_bundle_now(&self) -> anyhow::Result<Option<H256>> {
        for &entry_point in &self.supported_entry_points {
            let Some(ctx) = self.process(entry_point).await? else {
                continue;
            };
            if let Some(tx_hash) = tx_hash_from_data(&ctx) {
                return Ok(Some(tx_hash));
            }
        }
        Ok(None)
    }

    /// Continuously process batches until the shutdown token fires. Requests
    /// on `manual_rx` force an immediate iteration between ticks.
    pub async fn run(
        self: Arc<Self>,
        shutdown: CancellationToken,
        mut manual_rx: mpsc::Receiver<SendBundleRequest>,
    ) {
        let mut tick = time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // the first tick fires immediately; skip it so startup is quiet
        tick.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("bundler loop shutting down");
                    return;
                }
                _ = tick.tick() => {
                    self.run_once().await;
                }
                Some(request) = manual_rx.recv() => {
                    let result = self.send_bundle_now().await;
                    let _ = request.responder.send(result);
                }
            }
        }
    }
}

fn tx_hash_from_data(ctx: &BatchHandlerContext) -> Option<H256> {
    ctx.data
        .get(TX_HASH_DATA_KEY)
        .and_then(|value| value.as_str())
        .and_then(|text| text.parse().ok())
}

struct BundlerMetrics;

impl BundlerMetrics {
    fn record_run(included: usize, dropped: usize) {
        metrics::counter!("bundler_runs").increment(1);
        metrics::counter!("bundler_ops_included").increment(included as u64);
        metrics::counter!("bundler_ops_dropped").increment(dropped as u64);
    }
}
