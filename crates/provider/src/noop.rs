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

//! No-op collaborator implementations, used when a backing integration is not
//! configured.

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use hopper_types::{DepositInfo, HandleOpsRevert, UserOperation, ValidationOutput, ValidationRevert};

use crate::traits::{
    EntryPointTransactor, GetBaseFee, GetCode, GetGasTip, GetStake, SimulateValidation,
};

/// Returns empty bytecode for every address.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGetCode;

#[async_trait]
impl GetCode for NoopGetCode {
    async fn get_code(&self, _address: Address) -> anyhow::Result<Bytes> {
        Ok(Bytes::new())
    }
}

/// Reports every entity as unstaked with no deposit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGetStake;

#[async_trait]
impl GetStake for NoopGetStake {
    async fn get_stake(
        &self,
        _entry_point: Address,
        _entity: Address,
    ) -> anyhow::Result<DepositInfo> {
        Ok(DepositInfo::default())
    }
}

/// Reports a zero base fee.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGetBaseFee;

#[async_trait]
impl GetBaseFee for NoopGetBaseFee {
    async fn get_base_fee(&self) -> anyhow::Result<U256> {
        Ok(U256::zero())
    }
}

/// Reports a zero gas tip.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGetGasTip;

#[async_trait]
impl GetGasTip for NoopGetGasTip {
    async fn get_gas_tip(&self) -> anyhow::Result<U256> {
        Ok(U256::zero())
    }
}

/// Passes every operation through validation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSimulateValidation;

#[async_trait]
impl SimulateValidation for NoopSimulateValidation {
    async fn simulate_validation(
        &self,
        _entry_point: Address,
        _op: &UserOperation,
    ) -> anyhow::Result<Result<ValidationOutput, ValidationRevert>> {
        Ok(Ok(ValidationOutput::default()))
    }
}

/// Accepts every batch with a zero gas estimate and a zero transaction hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEntryPointTransactor;

#[async_trait]
impl EntryPointTransactor for NoopEntryPointTransactor {
    async fn estimate_handle_ops_gas(
        &self,
        _entry_point: Address,
        _batch: &[UserOperation],
        _beneficiary: Address,
    ) -> anyhow::Result<Result<u64, HandleOpsRevert>> {
        Ok(Ok(0))
    }

    async fn handle_ops(
        &self,
        _entry_point: Address,
        _batch: &[UserOperation],
        _beneficiary: Address,
        _gas_limit: u64,
    ) -> anyhow::Result<Result<H256, HandleOpsRevert>> {
        Ok(Ok(H256::zero()))
    }
}
