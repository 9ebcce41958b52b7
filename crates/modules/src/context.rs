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

use std::collections::HashMap;

use ethers::types::{Address, U256};
use hopper_pool::Mempool;
use hopper_provider::GetStake;
use hopper_types::{DepositInfo, UserOperation};

/// Shared context threaded through the batch pipeline during one bundler
/// iteration.
///
/// An operation identity appears in exactly one of `batch` and
/// `pending_removal` at all times; stages move operations between the two via
/// the removal helpers and never duplicate or silently drop them.
#[derive(Debug)]
pub struct BatchHandlerContext {
    /// The working batch, initially a snapshot copy so the pool is not aliased
    pub batch: Vec<UserOperation>,
    /// Operations to drop from the pool without submission
    pub pending_removal: Vec<UserOperation>,
    /// Target entry point
    pub entry_point: Address,
    /// Chain id
    pub chain_id: u64,
    /// Base fee of the current block
    pub base_fee: U256,
    /// Suggested priority fee
    pub tip: U256,
    /// Free-form correlation data for cross-stage communication, logged at
    /// the end of each run
    pub data: HashMap<String, serde_json::Value>,
}

impl BatchHandlerContext {
    /// Create a context over a copy of `batch`.
    pub fn new(
        batch: &[UserOperation],
        entry_point: Address,
        chain_id: u64,
        base_fee: U256,
        tip: U256,
    ) -> Self {
        Self {
            batch: batch.to_vec(),
            pending_removal: Vec::new(),
            entry_point,
            chain_id,
            base_fee,
            tip,
            data: HashMap::new(),
        }
    }

    /// Move the operation at `index` from the batch to pending removal. Used
    /// for ops that are not to be included on-chain and should be dropped
    /// from the pool. Out-of-range indexes are ignored.
    pub fn mark_op_index_for_removal(&mut self, index: usize) {
        if index >= self.batch.len() {
            return;
        }
        let op = self.batch.remove(index);
        self.pending_removal.push(op);
    }

    /// Move the first operation from the given sender to pending removal.
    pub fn mark_op_for_removal_by_sender(&mut self, sender: Address) {
        if let Some(index) = self.batch.iter().position(|op| op.sender == sender) {
            self.mark_op_index_for_removal(index);
        }
    }
}

/// Context threaded through the per-operation pipeline during client
/// admission. Pending pool state and entry point deposits for every entity
/// are fetched once at construction.
#[derive(Debug)]
pub struct UserOpHandlerContext {
    /// The candidate operation. A stage may replace it wholesale, e.g. to
    /// attach paymaster validation context.
    pub op: UserOperation,
    /// Target entry point
    pub entry_point: Address,
    /// Chain id
    pub chain_id: u64,
    pending_sender_ops: Vec<UserOperation>,
    pending_factory_ops: Vec<UserOperation>,
    pending_paymaster_ops: Vec<UserOperation>,
    sender_deposit: DepositInfo,
    factory_deposit: Option<DepositInfo>,
    paymaster_deposit: Option<DepositInfo>,
}

impl UserOpHandlerContext {
    /// Build a context for `op`, prefetching pending operations and deposits
    /// for the sender, factory and paymaster.
    pub async fn new(
        op: UserOperation,
        entry_point: Address,
        chain_id: u64,
        mempool: &Mempool,
        get_stake: &dyn GetStake,
    ) -> anyhow::Result<Self> {
        let pending_sender_ops = mempool.get_ops(entry_point, op.sender);
        let pending_factory_ops = match op.factory() {
            Some(factory) => mempool.get_ops(entry_point, factory),
            None => Vec::new(),
        };
        let pending_paymaster_ops = match op.paymaster() {
            Some(paymaster) => mempool.get_ops(entry_point, paymaster),
            None => Vec::new(),
        };

        let sender_deposit = get_stake.get_stake(entry_point, op.sender).await?;
        let factory_deposit = match op.factory() {
            Some(factory) => Some(get_stake.get_stake(entry_point, factory).await?),
            None => None,
        };
        let paymaster_deposit = match op.paymaster() {
            Some(paymaster) => Some(get_stake.get_stake(entry_point, paymaster).await?),
            None => None,
        };

        Ok(Self {
            op,
            entry_point,
            chain_id,
            pending_sender_ops,
            pending_factory_ops,
            pending_paymaster_ops,
            sender_deposit,
            factory_deposit,
            paymaster_deposit,
        })
    }

    /// Pending pool operations from the same sender, nonce-ascending.
    pub fn pending_sender_ops(&self) -> &[UserOperation] {
        &self.pending_sender_ops
    }

    /// Pending pool operations referencing the same factory.
    pub fn pending_factory_ops(&self) -> &[UserOperation] {
        &self.pending_factory_ops
    }

    /// Pending pool operations referencing the same paymaster.
    pub fn pending_paymaster_ops(&self) -> &[UserOperation] {
        &self.pending_paymaster_ops
    }

    /// The sender's entry point deposit.
    pub fn sender_deposit(&self) -> &DepositInfo {
        &self.sender_deposit
    }

    /// The factory's entry point deposit, if the operation has a factory.
    pub fn factory_deposit(&self) -> Option<&DepositInfo> {
        self.factory_deposit.as_ref()
    }

    /// The paymaster's entry point deposit, if the operation has a paymaster.
    pub fn paymaster_deposit(&self) -> Option<&DepositInfo> {
        self.paymaster_deposit.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn for_testing(op: UserOperation, entry_point: Address, chain_id: u64) -> Self {
        Self {
            op,
            entry_point,
            chain_id,
            pending_sender_ops: Vec::new(),
            pending_factory_ops: Vec::new(),
            pending_paymaster_ops: Vec::new(),
            sender_deposit: DepositInfo::default(),
            factory_deposit: None,
            paymaster_deposit: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_pending_sender_ops(mut self, ops: Vec<UserOperation>) -> Self {
        self.pending_sender_ops = ops;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_pending_paymaster_ops(mut self, ops: Vec<UserOperation>) -> Self {
        self.pending_paymaster_ops = ops;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_sender_deposit(mut self, deposit: DepositInfo) -> Self {
        self.sender_deposit = deposit;
        self
    }
}
