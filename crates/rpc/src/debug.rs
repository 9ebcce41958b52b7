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
use ethers::types::{Address, H256};
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use hopper_builder::BundlerHandle;
use hopper_pool::{Mempool, ReputationTracker};
use hopper_types::{Reputation, ReputationOverride, UserOperation};

use crate::error::EthRpcError;

/// Debug API, for testing and operator use. Not for public exposure.
#[rpc(server, namespace = "debug")]
pub trait DebugApi {
    /// Clears the bundler mempool.
    #[method(name = "bundler_clearState")]
    async fn bundler_clear_state(&self) -> RpcResult<String>;

    /// Dumps the current mempool in order of arrival.
    #[method(name = "bundler_dumpMempool")]
    async fn bundler_dump_mempool(&self, entry_point: Address) -> RpcResult<Vec<UserOperation>>;

    /// Forces the bundler to run one iteration immediately and returns the
    /// submitted transaction hash.
    #[method(name = "bundler_sendBundleNow")]
    async fn bundler_send_bundle_now(&self) -> RpcResult<H256>;

    /// Sets the reputation counters of the given entities.
    #[method(name = "bundler_setReputation")]
    async fn bundler_set_reputation(
        &self,
        entries: Vec<ReputationOverride>,
    ) -> RpcResult<String>;

    /// Dumps the reputation of every tracked entity.
    #[method(name = "bundler_dumpReputation")]
    async fn bundler_dump_reputation(&self) -> RpcResult<Vec<Reputation>>;
}

/// Operator methods behind the debug namespace.
pub struct DebugApi {
    mempool: Arc<Mempool>,
    reputation: Arc<ReputationTracker>,
    bundler: BundlerHandle,
}

impl DebugApi {
    /// Create the API over the pool, the reputation tracker and a bundler
    /// handle.
    pub fn new(
        mempool: Arc<Mempool>,
        reputation: Arc<ReputationTracker>,
        bundler: BundlerHandle,
    ) -> Self {
        Self {
            mempool,
            reputation,
            bundler,
        }
    }
}

#[async_trait]
impl DebugApiServer for DebugApi {
    async fn bundler_clear_state(&self) -> RpcResult<String> {
        self.mempool.clear().map_err(EthRpcError::from)?;
        Ok("ok".to_string())
    }

    async fn bundler_dump_mempool(&self, entry_point: Address) -> RpcResult<Vec<UserOperation>> {
        Ok(self.mempool.dump(entry_point))
    }

    async fn bundler_send_bundle_now(&self) -> RpcResult<H256> {
        let tx_hash = self
            .bundler
            .send_bundle_now()
            .await
            .map_err(EthRpcError::Internal)?;
        match tx_hash {
            Some(tx_hash) => Ok(tx_hash),
            None => Err(
                EthRpcError::InvalidParams("no bundle was submitted".to_string()).into(),
            ),
        }
    }

    async fn bundler_set_reputation(&self, entries: Vec<ReputationOverride>) -> RpcResult<String> {
        self.reputation
            .set_overrides(&entries)
            .map_err(EthRpcError::from)?;
        Ok("ok".to_string())
    }

    async fn bundler_dump_reputation(&self) -> RpcResult<Vec<Reputation>> {
        Ok(self.reputation.dump().map_err(EthRpcError::from)?)
    }
}
