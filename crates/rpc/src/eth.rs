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

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, H256, U64};
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use hopper_modules::{UserOpHandlerContext, UserOpPipeline};
use hopper_pool::Mempool;
use hopper_provider::GetStake;
use hopper_types::{MempoolError, UserOperation};
use tracing::info;

use crate::error::{EthResult, EthRpcError};

/// Eth API
#[rpc(server, namespace = "eth")]
pub trait EthApi {
    /// Submits a user operation for inclusion via the given entry point and
    /// returns its request identifier.
    #[method(name = "sendUserOperation")]
    async fn send_user_operation(&self, op: UserOperation, entry_point: Address)
        -> RpcResult<H256>;

    /// The entry point addresses this bundler supports, in order of
    /// preference.
    #[method(name = "supportedEntryPoints")]
    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>>;

    /// The chain id this bundler targets.
    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<U64>;
}

/// Client admission flow behind the eth namespace: resolve the entry point,
/// run the per-operation pipeline, then commit to the pool.
pub struct EthApi {
    mempool: Arc<Mempool>,
    pipeline: UserOpPipeline,
    get_stake: Arc<dyn GetStake>,
    chain_id: u64,
    supported_entry_points: Vec<Address>,
}

impl EthApi {
    /// Create the API over the pool and the configured admission pipeline.
    pub fn new(
        mempool: Arc<Mempool>,
        pipeline: UserOpPipeline,
        get_stake: Arc<dyn GetStake>,
        chain_id: u64,
        supported_entry_points: Vec<Address>,
    ) -> Self {
        Self {
            mempool,
            pipeline,
            get_stake,
            chain_id,
            supported_entry_points,
        }
    }

    fn resolve_entry_point(&self, entry_point: Address) -> EthResult<Address> {
        self.supported_entry_points
            .iter()
            .find(|&&supported| supported == entry_point)
            .copied()
            .ok_or_else(|| MempoolError::UnknownEntryPoint(entry_point).into())
    }

    pub(crate) async fn send_user_operation_inner(
        &self,
        op: UserOperation,
        entry_point: Address,
    ) -> EthResult<H256> {
        let entry_point = self.resolve_entry_point(entry_point)?;
        let hash = op.hash(entry_point, self.chain_id);

        let mut ctx = UserOpHandlerContext::new(
            op,
            entry_point,
            self.chain_id,
            &self.mempool,
            self.get_stake.as_ref(),
        )
        .await
        .map_err(EthRpcError::Internal)?;

        self.pipeline.run(&mut ctx).await.map_err(EthRpcError::from)?;

        self.mempool
            .add_op(entry_point, ctx.op)
            .map_err(EthRpcError::from)?;

        info!(
            userop_hash = ?hash,
            entry_point = ?entry_point,
            chain_id = self.chain_id,
            "eth_sendUserOperation ok"
        );
        Ok(hash)
    }
}

#[async_trait]
impl EthApiServer for EthApi {
    async fn send_user_operation(
        &self,
        op: UserOperation,
        entry_point: Address,
    ) -> RpcResult<H256> {
        self.send_user_operation_inner(op, entry_point)
            .await
            .map_err(Into::into)
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>> {
        Ok(self.supported_entry_points.clone())
    }

    async fn chain_id(&self) -> RpcResult<U64> {
        Ok(self.chain_id.into())
    }
}

#[cfg(test)]
mod tests {
    use hopper_db::Store;
    use hopper_modules::checks::ValidatePendingOps;
    use hopper_provider::NoopGetStake;
    use tempfile::TempDir;

    use super::*;

    fn api(dir: &TempDir, entry_point: Address) -> EthApi {
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let mempool = Arc::new(Mempool::new(store).unwrap());
        let pipeline = UserOpPipeline::new().with(ValidatePendingOps);
        EthApi::new(
            mempool,
            pipeline,
            Arc::new(NoopGetStake),
            1,
            vec![entry_point],
        )
    }

    fn op_with_fees(sender: Address, priority_fee: u64, max_fee: u64) -> UserOperation {
        UserOperation {
            sender,
            nonce: 0.into(),
            max_priority_fee_per_gas: priority_fee.into(),
            max_fee_per_gas: max_fee.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn admission_commits_to_pool() {
        let dir = TempDir::new().unwrap();
        let entry_point = Address::random();
        let api = api(&dir, entry_point);

        let op = op_with_fees(Address::random(), 5, 50);
        let hash = api
            .send_user_operation_inner(op.clone(), entry_point)
            .await
            .unwrap();

        assert_eq!(hash, op.hash(entry_point, 1));
        assert_eq!(api.mempool.get_ops(entry_point, op.sender), vec![op]);
    }

    #[tokio::test]
    async fn unknown_entry_point_is_rejected() {
        let dir = TempDir::new().unwrap();
        let api = api(&dir, Address::random());

        let op = op_with_fees(Address::random(), 5, 50);
        let err = api
            .send_user_operation_inner(op, Address::random())
            .await
            .unwrap_err();
        assert!(matches!(err, EthRpcError::InvalidParams(_)));
    }

    #[tokio::test]
    async fn invalid_replacement_leaves_pool_unchanged() {
        let dir = TempDir::new().unwrap();
        let entry_point = Address::random();
        let api = api(&dir, entry_point);
        let sender = Address::random();

        let pending = op_with_fees(sender, 5, 50);
        api.send_user_operation_inner(pending.clone(), entry_point)
            .await
            .unwrap();

        // unchanged priority fee
        let replacement = op_with_fees(sender, 5, 60);
        let err = api
            .send_user_operation_inner(replacement, entry_point)
            .await
            .unwrap_err();
        assert!(matches!(err, EthRpcError::InvalidParams(_)));
        assert_eq!(api.mempool.get_ops(entry_point, sender), vec![pending]);
    }

    #[tokio::test]
    async fn valid_replacement_swaps_the_op() {
        let dir = TempDir::new().unwrap();
        let entry_point = Address::random();
        let api = api(&dir, entry_point);
        let sender = Address::random();

        api.send_user_operation_inner(op_with_fees(sender, 5, 50), entry_point)
            .await
            .unwrap();
        let replacement = op_with_fees(sender, 8, 53);
        api.send_user_operation_inner(replacement.clone(), entry_point)
            .await
            .unwrap();

        assert_eq!(api.mempool.get_ops(entry_point, sender), vec![replacement]);
    }
}
