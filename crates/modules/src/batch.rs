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

//! Batch shaping stages.

use std::cmp::Ordering;

use async_trait::async_trait;
use ethers::types::U256;

use crate::{BatchHandler, BatchHandlerContext};

/// Truncates the batch so its cumulative max gas stays under the configured
/// threshold.
///
/// Truncated operations are not marked for removal: they simply stay in the
/// pool for a later bundle.
#[derive(Debug, Clone, Copy)]
pub struct MaintainGasLimit {
    max_batch_gas_limit: U256,
}

impl MaintainGasLimit {
    /// Create the stage with a batch gas budget.
    pub fn new(max_batch_gas_limit: U256) -> Self {
        Self {
            max_batch_gas_limit,
        }
    }
}

#[async_trait]
impl BatchHandler for MaintainGasLimit {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        let mut kept = Vec::with_capacity(ctx.batch.len());
        let mut total = U256::zero();
        for op in &ctx.batch {
            total = total + op.max_gas_available();
            if total >= self.max_batch_gas_limit {
                break;
            }
            kept.push(op.clone());
        }
        ctx.batch = kept;
        Ok(())
    }
}

/// Ensures ops from the same sender are ordered by ascending nonce,
/// regardless of fees. Ops from different senders keep their relative order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortByNonce;

#[async_trait]
impl BatchHandler for SortByNonce {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        ctx.batch.sort_by(|a, b| {
            if a.sender == b.sender {
                a.nonce.cmp(&b.nonce)
            } else {
                Ordering::Equal
            }
        });
        Ok(())
    }
}

/// Drops operations whose max fee no longer covers the current base fee.
#[derive(Debug, Default, Clone, Copy)]
pub struct FilterUnderpriced;

#[async_trait]
impl BatchHandler for FilterUnderpriced {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        for index in (0..ctx.batch.len()).rev() {
            if ctx.batch[index].max_fee_per_gas < ctx.base_fee {
                ctx.mark_op_index_for_removal(index);
            }
        }
        Ok(())
    }
}
