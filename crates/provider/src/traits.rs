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

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use hopper_types::{DepositInfo, HandleOpsRevert, UserOperation, ValidationOutput, ValidationRevert};
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Fetch the deployed bytecode at an address.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait GetCode: Send + Sync + 'static {
    /// Bytecode at `address`, empty if the account has no code.
    async fn get_code(&self, address: Address) -> anyhow::Result<Bytes>;
}

/// Fetch an entity's deposit and stake with an entry point.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait GetStake: Send + Sync + 'static {
    /// Deposit info for `entity` on `entry_point`.
    async fn get_stake(&self, entry_point: Address, entity: Address) -> anyhow::Result<DepositInfo>;
}

/// Fetch the current block base fee.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait GetBaseFee: Send + Sync + 'static {
    /// Base fee of the latest block, in wei.
    async fn get_base_fee(&self) -> anyhow::Result<U256>;
}

/// Fetch the suggested priority fee.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait GetGasTip: Send + Sync + 'static {
    /// Suggested max priority fee per gas, in wei.
    async fn get_gas_tip(&self) -> anyhow::Result<U256>;
}

/// Simulate entry point validation of a single operation.
///
/// The outer result is a transport failure; the inner result distinguishes a
/// passing simulation from a structured on-chain revert, which is an
/// admission outcome rather than an error.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait SimulateValidation: Send + Sync + 'static {
    /// Run `simulateValidation` for `op` against `entry_point`.
    async fn simulate_validation(
        &self,
        entry_point: Address,
        op: &UserOperation,
    ) -> anyhow::Result<Result<ValidationOutput, ValidationRevert>>;
}

/// Estimate and submit `handleOps` transactions against an entry point.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EntryPointTransactor: Send + Sync + 'static {
    /// Estimate gas for a `handleOps` call over `batch`. A structured revert
    /// names the operation that caused it so the caller can retry without it.
    async fn estimate_handle_ops_gas(
        &self,
        entry_point: Address,
        batch: &[UserOperation],
        beneficiary: Address,
    ) -> anyhow::Result<Result<u64, HandleOpsRevert>>;

    /// Submit a `handleOps` transaction over `batch`.
    async fn handle_ops(
        &self,
        entry_point: Address,
        batch: &[UserOperation],
        beneficiary: Address,
        gas_limit: u64,
    ) -> anyhow::Result<Result<H256, HandleOpsRevert>>;
}
