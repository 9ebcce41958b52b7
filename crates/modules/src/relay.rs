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

//! Bundle submission stage.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use ethers::types::Address;
use hopper_provider::EntryPointTransactor;
use serde_json::json;
use tracing::{info, warn};

use crate::{BatchHandler, BatchHandlerContext};

/// Context data key under which the submitted transaction hash is recorded.
pub const TX_HASH_DATA_KEY: &str = "tx_hash";

/// Submits the working batch to the entry point as a `handleOps` transaction.
///
/// Gas estimation runs first; a structured revert names the offending
/// operation, which is marked for removal before retrying, until the batch is
/// clean or exhausted. Only unexpected failures abort the stage.
pub struct Relayer {
    transactor: Arc<dyn EntryPointTransactor>,
    beneficiary: Address,
}

impl Relayer {
    /// Create the stage with a transactor and the fee beneficiary address.
    pub fn new(transactor: Arc<dyn EntryPointTransactor>, beneficiary: Address) -> Self {
        Self {
            transactor,
            beneficiary,
        }
    }
}

#[async_trait]
impl BatchHandler for Relayer {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        let mut revert_reasons = Vec::new();
        let mut gas_limit = None;

        while !ctx.batch.is_empty() {
            match self
                .transactor
                .estimate_handle_ops_gas(ctx.entry_point, &ctx.batch, self.beneficiary)
                .await?
            {
                Ok(estimate) => {
                    gas_limit = Some(estimate);
                    break;
                }
                Err(revert) => {
                    warn!(
                        op_index = revert.op_index,
                        reason = %revert.reason,
                        "op reverted during gas estimate, dropping from batch"
                    );
                    revert_reasons.push(revert.reason.clone());
                    ctx.mark_op_index_for_removal(revert.op_index);
                }
            }
        }

        ctx.data
            .insert("relayer_est_revert_reasons".to_string(), json!(revert_reasons));

        let Some(gas_limit) = gas_limit else {
            return Ok(());
        };

        match self
            .transactor
            .handle_ops(ctx.entry_point, &ctx.batch, self.beneficiary, gas_limit)
            .await?
        {
            Ok(tx_hash) => {
                info!(tx_hash = ?tx_hash, ops = ctx.batch.len(), "submitted handleOps transaction");
                ctx.data
                    .insert(TX_HASH_DATA_KEY.to_string(), json!(format!("{tx_hash:?}")));
                Ok(())
            }
            Err(revert) => bail!("handleOps reverted: {}", revert.reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::H256;
    use hopper_provider::MockEntryPointTransactor;
    use hopper_types::{HandleOpsRevert, UserOperation};

    use super::*;

    fn op() -> UserOperation {
        UserOperation {
            sender: Address::random(),
            ..Default::default()
        }
    }

    fn ctx_with(batch: Vec<UserOperation>) -> BatchHandlerContext {
        BatchHandlerContext::new(&batch, Address::random(), 1, 0.into(), 0.into())
    }

    #[tokio::test]
    async fn clean_batch_is_submitted() {
        let tx_hash = H256::random();
        let mut transactor = MockEntryPointTransactor::new();
        transactor
            .expect_estimate_handle_ops_gas()
            .returning(|_, _, _| Ok(Ok(500_000)));
        transactor
            .expect_handle_ops()
            .withf(|_, _, _, gas_limit| *gas_limit == 500_000)
            .returning(move |_, _, _, _| Ok(Ok(tx_hash)));

        let stage = Relayer::new(Arc::new(transactor), Address::random());
        let mut ctx = ctx_with(vec![op(), op()]);
        stage.handle(&mut ctx).await.unwrap();

        assert_eq!(ctx.batch.len(), 2);
        assert_eq!(
            ctx.data.get(TX_HASH_DATA_KEY).unwrap(),
            &json!(format!("{tx_hash:?}"))
        );
    }

    #[tokio::test]
    async fn estimate_revert_drops_op_and_retries() {
        let mut transactor = MockEntryPointTransactor::new();
        // first estimate blames op #1, second estimate passes
        transactor
            .expect_estimate_handle_ops_gas()
            .times(1)
            .withf(|_, batch, _| batch.len() == 3)
            .returning(|_, _, _| {
                Ok(Err(HandleOpsRevert {
                    op_index: 1,
                    paymaster: None,
                    reason: "AA25 invalid nonce".to_string(),
                }))
            });
        transactor
            .expect_estimate_handle_ops_gas()
            .withf(|_, batch, _| batch.len() == 2)
            .returning(|_, _, _| Ok(Ok(300_000)));
        transactor
            .expect_handle_ops()
            .withf(|_, batch, _, _| batch.len() == 2)
            .returning(|_, _, _, _| Ok(Ok(H256::zero())));

        let ops = vec![op(), op(), op()];
        let dropped = ops[1].clone();
        let stage = Relayer::new(Arc::new(transactor), Address::random());
        let mut ctx = ctx_with(ops);
        stage.handle(&mut ctx).await.unwrap();

        assert_eq!(ctx.batch.len(), 2);
        assert_eq!(ctx.pending_removal, vec![dropped]);
    }

    #[tokio::test]
    async fn batch_exhausted_by_reverts_is_not_submitted() {
        let mut transactor = MockEntryPointTransactor::new();
        transactor
            .expect_estimate_handle_ops_gas()
            .returning(|_, _, _| {
                Ok(Err(HandleOpsRevert {
                    op_index: 0,
                    paymaster: None,
                    reason: "AA10 sender already constructed".to_string(),
                }))
            });
        transactor.expect_handle_ops().never();

        let stage = Relayer::new(Arc::new(transactor), Address::random());
        let mut ctx = ctx_with(vec![op(), op()]);
        stage.handle(&mut ctx).await.unwrap();

        assert!(ctx.batch.is_empty());
        assert_eq!(ctx.pending_removal.len(), 2);
        assert!(!ctx.data.contains_key(TX_HASH_DATA_KEY));
    }

    #[tokio::test]
    async fn submit_revert_fails_the_stage() {
        let mut transactor = MockEntryPointTransactor::new();
        transactor
            .expect_estimate_handle_ops_gas()
            .returning(|_, _, _| Ok(Ok(100_000)));
        transactor.expect_handle_ops().returning(|_, _, _, _| {
            Ok(Err(HandleOpsRevert {
                op_index: 0,
                paymaster: None,
                reason: "AA95 out of gas".to_string(),
            }))
        });

        let stage = Relayer::new(Arc::new(transactor), Address::random());
        let mut ctx = ctx_with(vec![op()]);
        assert!(stage.handle(&mut ctx).await.is_err());
    }
}
