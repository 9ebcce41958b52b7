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

//! Reputation-backed admission stages.
//!
//! Each stage derives its decision from the decaying per-entity counters in
//! the shared store. Entities absent from an operation (no factory, no
//! paymaster) are always skipped.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use ethers::types::Address;
use hopper_pool::ReputationTracker;
use hopper_types::{Entity, MempoolError, MempoolResult, ReputationStatus};

use crate::{BatchHandler, BatchHandlerContext, UserOpHandler, UserOpHandlerContext};

/// Rejects operations whose entities are banned, or throttled while already
/// at the throttled-entity pool cap.
pub struct CheckStatus {
    tracker: Arc<ReputationTracker>,
}

impl CheckStatus {
    /// Create the stage over the shared reputation tracker.
    pub fn new(tracker: Arc<ReputationTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl UserOpHandler for CheckStatus {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let throttled_cap = self.tracker.params().throttled_entity_mempool_count as usize;

        let mut checks = vec![(
            Entity::account(ctx.op.sender),
            ctx.pending_sender_ops().len(),
        )];
        if let Some(factory) = ctx.op.factory() {
            checks.push((Entity::factory(factory), ctx.pending_factory_ops().len()));
        }
        if let Some(paymaster) = ctx.op.paymaster() {
            checks.push((
                Entity::paymaster(paymaster),
                ctx.pending_paymaster_ops().len(),
            ));
        }

        for (entity, pending_count) in checks {
            match self.tracker.status(entity.address)? {
                ReputationStatus::Banned => return Err(MempoolError::ThrottledOrBanned(entity)),
                ReputationStatus::Throttled if pending_count >= throttled_cap => {
                    return Err(MempoolError::ThrottledOrBanned(entity))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Caps pending pool counts for unstaked entities. Senders and
/// factory/paymaster entities carry distinct caps.
pub struct ValidateOpLimit {
    tracker: Arc<ReputationTracker>,
}

impl ValidateOpLimit {
    /// Create the stage over the shared reputation tracker.
    pub fn new(tracker: Arc<ReputationTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl UserOpHandler for ValidateOpLimit {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let params = self.tracker.params();

        if !ctx.sender_deposit().staked
            && ctx.pending_sender_ops().len() >= params.same_sender_mempool_count as usize
        {
            return Err(MempoolError::MaxOperationsReached(
                params.same_sender_mempool_count,
                Entity::account(ctx.op.sender),
            ));
        }

        if let (Some(factory), Some(deposit)) = (ctx.op.factory(), ctx.factory_deposit()) {
            if !deposit.staked
                && ctx.pending_factory_ops().len()
                    >= params.same_unstaked_entity_mempool_count as usize
            {
                return Err(MempoolError::MaxOperationsReached(
                    params.same_unstaked_entity_mempool_count,
                    Entity::factory(factory),
                ));
            }
        }

        if let (Some(paymaster), Some(deposit)) = (ctx.op.paymaster(), ctx.paymaster_deposit()) {
            if !deposit.staked
                && ctx.pending_paymaster_ops().len()
                    >= params.same_unstaked_entity_mempool_count as usize
            {
                return Err(MempoolError::MaxOperationsReached(
                    params.same_unstaked_entity_mempool_count,
                    Entity::paymaster(paymaster),
                ));
            }
        }

        Ok(())
    }
}

/// Increments `opsSeen` for every entity of an admitted operation.
pub struct IncOpsSeen {
    tracker: Arc<ReputationTracker>,
}

impl IncOpsSeen {
    /// Create the stage over the shared reputation tracker.
    pub fn new(tracker: Arc<ReputationTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl UserOpHandler for IncOpsSeen {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        self.tracker
            .add_seen(ctx.op.entities().into_iter().map(|entity| entity.address))
    }
}

/// Increments `opsIncluded` for every entity in the submitted batch, in one
/// store transaction. Runs last, after on-chain submission.
pub struct IncOpsIncluded {
    tracker: Arc<ReputationTracker>,
}

impl IncOpsIncluded {
    /// Create the stage over the shared reputation tracker.
    pub fn new(tracker: Arc<ReputationTracker>) -> Self {
        Self { tracker }
    }
}

#[async_trait]
impl BatchHandler for IncOpsIncluded {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        let mut counts: HashMap<Address, u64> = HashMap::new();
        for op in &ctx.batch {
            for entity in op.entities() {
                *counts.entry(entity.address).or_default() += 1;
            }
        }

        if counts.is_empty() {
            return Ok(());
        }
        self.tracker.add_included(&counts).map_err(Into::into)
    }
}
