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

//! Node-backed collaborator implementations over a JSON-RPC endpoint.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{Address, BlockNumber, Bytes, U256},
};

use crate::traits::{GetBaseFee, GetCode, GetGasTip};

/// Chain read collaborators backed by an Ethereum node.
#[derive(Debug, Clone)]
pub struct NodeProviders {
    provider: Arc<Provider<Http>>,
}

impl NodeProviders {
    /// Connect to a node over HTTP.
    pub fn connect(url: &str) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(url).context("invalid node http url")?;
        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

#[async_trait]
impl GetCode for NodeProviders {
    async fn get_code(&self, address: Address) -> anyhow::Result<Bytes> {
        self.provider
            .get_code(address, None)
            .await
            .context("eth_getCode failed")
    }
}

#[async_trait]
impl GetBaseFee for NodeProviders {
    async fn get_base_fee(&self) -> anyhow::Result<U256> {
        let block = self
            .provider
            .get_block(BlockNumber::Latest)
            .await
            .context("eth_getBlockByNumber failed")?
            .context("no latest block")?;
        Ok(block.base_fee_per_gas.unwrap_or_default())
    }
}

#[async_trait]
impl GetGasTip for NodeProviders {
    async fn get_gas_tip(&self) -> anyhow::Result<U256> {
        self.provider
            .request("eth_maxPriorityFeePerGas", ())
            .await
            .context("eth_maxPriorityFeePerGas failed")
    }
}
