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

mod queues;
use queues::UserOpQueues;

mod store;

use std::sync::Arc;

use anyhow::Context;
use ethers::types::Address;
use hopper_db::Store;
use hopper_types::{MempoolResult, UserOperation};
use parking_lot::RwLock;
use tracing::info;

/// Pool of pending user operations which have passed all admission checks.
///
/// Persistence is updated strictly before the in-memory indexes it guards, so
/// a store failure leaves the visible state untouched and a restart replays
/// exactly what was accepted. Safe to call from multiple threads; writers
/// block on a per-pool lock.
pub struct Mempool {
    store: Arc<Store>,
    queues: RwLock<UserOpQueues>,
}

impl Mempool {
    /// Create a pool backed by `store`, replaying every persisted operation.
    ///
    /// Fails if any record cannot be decoded: the pool must never start with
    /// a partial view of what was durably accepted.
    pub fn new(store: Arc<Store>) -> anyhow::Result<Self> {
        let mut queues = UserOpQueues::default();
        let replayed = store::replay(&store, &mut queues)?;
        if replayed > 0 {
            info!(count = replayed, "replayed mempool records from store");
        }

        Ok(Self {
            store,
            queues: RwLock::new(queues),
        })
    }

    /// Add an operation, replacing any live operation with the same sender
    /// and nonce. Replacement fee policy is enforced upstream by the handler
    /// pipeline; the pool itself is policy-agnostic.
    pub fn add_op(&self, entry_point: Address, op: UserOperation) -> MempoolResult<()> {
        let record = store::encode_record(&op, entry_point)
            .context("failed to encode mempool record")?;
        self.store
            .put(&store::op_key(entry_point, op.sender), &record)
            .context("failed to persist operation")?;

        let mut queues = self.queues.write();
        queues.add_op(entry_point, op);
        PoolMetrics::set_ops_count(queues.count(entry_point), entry_point);
        Ok(())
    }

    /// All pending operations for a sender, nonce-ascending. Empty if none.
    pub fn get_ops(&self, entry_point: Address, sender: Address) -> Vec<UserOperation> {
        self.queues.read().ops_by_sender(entry_point, sender)
    }

    /// The next candidate batch, in global arrival order. Does not mutate the
    /// pool; callers remove operations explicitly once processed.
    pub fn bundle_ops(&self, entry_point: Address) -> Vec<UserOperation> {
        self.queues.read().arrival_order(entry_point)
    }

    /// Remove operations by sender and nonce. Removing an absent operation is
    /// a no-op. All persistence deletes happen in one transaction before the
    /// indexes are touched.
    pub fn remove_ops(&self, entry_point: Address, ops: &[UserOperation]) -> MempoolResult<()> {
        self.store
            .update(|txn| {
                for op in ops {
                    txn.delete(store::op_key(entry_point, op.sender))?;
                }
                Ok(())
            })
            .context("failed to remove operations from store")?;

        let mut queues = self.queues.write();
        for op in ops {
            queues.remove_op(entry_point, &op.id());
        }
        PoolMetrics::set_ops_count(queues.count(entry_point), entry_point);
        Ok(())
    }

    /// Full snapshot in arrival order, for diagnostics and testing.
    pub fn dump(&self, entry_point: Address) -> Vec<UserOperation> {
        self.queues.read().arrival_order(entry_point)
    }

    /// Wipe all persisted operations and reset the in-memory state. Hard
    /// resets only.
    pub fn clear(&self) -> MempoolResult<()> {
        self.store
            .delete_prefix(&store::key_prefix())
            .context("failed to clear mempool records")?;
        self.queues.write().clear();
        Ok(())
    }
}

impl std::fmt::Debug for Mempool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mempool").finish_non_exhaustive()
    }
}

struct PoolMetrics;

impl PoolMetrics {
    fn set_ops_count(num_ops: usize, entry_point: Address) {
        metrics::gauge!("op_pool_num_ops", "entry_point" => format!("{entry_point:?}"))
            .set(num_ops as f64);
    }
}
