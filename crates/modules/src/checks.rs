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

//! Client-side sanity and replacement checks.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use hopper_provider::{GetBaseFee, GetCode};
use hopper_types::{MempoolError, MempoolResult};

use crate::{UserOpHandler, UserOpHandlerContext};

/// Enforces the replace-by-fee rule against the sender's pending operations.
///
/// A candidate that shares a nonce with a pending operation is a replacement
/// and is accepted only if its priority fee is strictly higher and its max
/// fee is raised by at least the same absolute amount. The comparison is
/// always against the pooled operation, never the candidate itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidatePendingOps;

#[async_trait]
impl UserOpHandler for ValidatePendingOps {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let existing = ctx
            .pending_sender_ops()
            .iter()
            .find(|pending| pending.nonce == ctx.op.nonce)
            .cloned();

        if let Some(existing) = existing {
            if ctx.op.max_priority_fee_per_gas <= existing.max_priority_fee_per_gas {
                return Err(MempoolError::ReplacementUnderpriced(
                    existing.max_priority_fee_per_gas,
                ));
            }

            let increase = ctx.op.max_priority_fee_per_gas - existing.max_priority_fee_per_gas;
            let required_max_fee = existing.max_fee_per_gas + increase;
            if ctx.op.max_fee_per_gas < required_max_fee {
                return Err(MempoolError::ReplacementFeeIncreaseTooLow(required_max_fee));
            }
        }

        Ok(())
    }
}

/// Rejects operations whose max fee cannot cover the current base fee.
pub struct ValidateGasFee {
    base_fee: Arc<dyn GetBaseFee>,
}

impl ValidateGasFee {
    /// Create the stage over a base fee source.
    pub fn new(base_fee: Arc<dyn GetBaseFee>) -> Self {
        Self { base_fee }
    }
}

#[async_trait]
impl UserOpHandler for ValidateGasFee {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let base_fee = self
            .base_fee
            .get_base_fee()
            .await
            .context("failed to fetch base fee")?;

        if ctx.op.max_fee_per_gas < base_fee {
            return Err(MempoolError::MaxFeeTooLow(ctx.op.max_fee_per_gas, base_fee));
        }
        Ok(())
    }
}

/// Checks that the sender account state is consistent with the init code:
/// an undeployed sender must carry init code and a deployed sender must not.
pub struct ValidateSender {
    get_code: Arc<dyn GetCode>,
}

impl ValidateSender {
    /// Create the stage over a bytecode source.
    pub fn new(get_code: Arc<dyn GetCode>) -> Self {
        Self { get_code }
    }
}

#[async_trait]
impl UserOpHandler for ValidateSender {
    async fn handle(&self, ctx: &mut UserOpHandlerContext) -> MempoolResult<()> {
        let code = self
            .get_code
            .get_code(ctx.op.sender)
            .await
            .context("failed to fetch sender code")?;

        match (code.is_empty(), ctx.op.factory().is_some()) {
            (true, false) => Err(MempoolError::InvalidSender(
                "sender has no deployed code and no initCode".to_string(),
            )),
            (false, true) => Err(MempoolError::InvalidSender(
                "sender already deployed but op contains initCode".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::{Address, U256};
    use hopper_provider::{MockGetBaseFee, MockGetCode};
    use hopper_types::UserOperation;

    use super::*;

    fn pending_op(sender: Address, nonce: u64, priority_fee: u64, max_fee: u64) -> UserOperation {
        UserOperation {
            sender,
            nonce: nonce.into(),
            max_priority_fee_per_gas: priority_fee.into(),
            max_fee_per_gas: max_fee.into(),
            ..Default::default()
        }
    }

    fn replacement_ctx(candidate: UserOperation, pending: Vec<UserOperation>) -> UserOpHandlerContext {
        UserOpHandlerContext::for_testing(candidate, Address::random(), 1)
            .with_pending_sender_ops(pending)
    }

    #[tokio::test]
    async fn first_op_for_sender_passes() {
        let sender = Address::random();
        let mut ctx = replacement_ctx(pending_op(sender, 0, 5, 50), vec![]);
        ValidatePendingOps.handle(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn unchanged_priority_fee_is_rejected() {
        let sender = Address::random();
        let existing = pending_op(sender, 0, 5, 50);
        let candidate = pending_op(sender, 0, 5, 60);
        let mut ctx = replacement_ctx(candidate, vec![existing]);

        let err = ValidatePendingOps.handle(&mut ctx).await.unwrap_err();
        match err {
            MempoolError::ReplacementUnderpriced(fee) => assert_eq!(fee, U256::from(5)),
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn max_fee_must_rise_with_priority_fee() {
        let sender = Address::random();
        let existing = pending_op(sender, 0, 5, 50);
        // priority fee +3 but max fee only +2
        let candidate = pending_op(sender, 0, 8, 52);
        let mut ctx = replacement_ctx(candidate, vec![existing]);

        let err = ValidatePendingOps.handle(&mut ctx).await.unwrap_err();
        match err {
            MempoolError::ReplacementFeeIncreaseTooLow(required) => {
                assert_eq!(required, U256::from(53))
            }
            other => panic!("wrong error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn valid_replacement_passes() {
        let sender = Address::random();
        let existing = pending_op(sender, 0, 5, 50);
        let candidate = pending_op(sender, 0, 8, 53);
        let mut ctx = replacement_ctx(candidate, vec![existing]);

        ValidatePendingOps.handle(&mut ctx).await.unwrap();
    }

    // The comparison must target the pooled op with the matching nonce, not
    // the candidate's own fields.
    #[tokio::test]
    async fn replacement_compares_against_pooled_op() {
        let sender = Address::random();
        let existing = pending_op(sender, 0, 10, 100);
        // would pass trivially if compared against itself
        let candidate = pending_op(sender, 0, 10, 100);
        let mut ctx = replacement_ctx(candidate, vec![existing]);

        assert!(ValidatePendingOps.handle(&mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn different_nonce_is_not_a_replacement() {
        let sender = Address::random();
        let existing = pending_op(sender, 0, 10, 100);
        let candidate = pending_op(sender, 1, 1, 10);
        let mut ctx = replacement_ctx(candidate, vec![existing]);

        ValidatePendingOps.handle(&mut ctx).await.unwrap();
    }

    #[tokio::test]
    async fn max_fee_below_base_fee_is_rejected() {
        let mut base_fee = MockGetBaseFee::new();
        base_fee
            .expect_get_base_fee()
            .returning(|| Ok(U256::from(100)));
        let stage = ValidateGasFee::new(Arc::new(base_fee));

        let op = pending_op(Address::random(), 0, 5, 50);
        let mut ctx = UserOpHandlerContext::for_testing(op, Address::random(), 1);
        assert!(matches!(
            stage.handle(&mut ctx).await.unwrap_err(),
            MempoolError::MaxFeeTooLow(_, _)
        ));
    }

    #[tokio::test]
    async fn undeployed_sender_without_init_code_is_rejected() {
        let mut get_code = MockGetCode::new();
        get_code
            .expect_get_code()
            .returning(|_| Ok(Default::default()));
        let stage = ValidateSender::new(Arc::new(get_code));

        let op = pending_op(Address::random(), 0, 5, 50);
        let mut ctx = UserOpHandlerContext::for_testing(op, Address::random(), 1);
        assert!(matches!(
            stage.handle(&mut ctx).await.unwrap_err(),
            MempoolError::InvalidSender(_)
        ));
    }

    #[tokio::test]
    async fn deployed_sender_without_init_code_passes() {
        let mut get_code = MockGetCode::new();
        get_code
            .expect_get_code()
            .returning(|_| Ok(vec![0x60, 0x80].into()));
        let stage = ValidateSender::new(Arc::new(get_code));

        let op = pending_op(Address::random(), 0, 5, 50);
        let mut ctx = UserOpHandlerContext::for_testing(op, Address::random(), 1);
        stage.handle(&mut ctx).await.unwrap();
    }
}
