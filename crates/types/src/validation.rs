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

use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

/// Entry point deposit information for an entity
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInfo {
    /// The entity's current deposit with the entry point
    pub deposit: U256,
    /// Whether the entity's stake counts as staked
    pub staked: bool,
    /// The entity's staked amount
    pub stake: U256,
    /// Delay before the stake can be withdrawn, in seconds
    pub unstake_delay_sec: U256,
}

/// Successful outcome of a validation simulation
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOutput {
    /// Gas consumed before the execution call
    pub pre_op_gas: U256,
    /// Wei the sender or paymaster must prefund
    pub prefund: U256,
}

/// Structured rejection produced by a validation simulation. This is an
/// admission outcome, not a transport failure.
#[derive(Debug, Clone)]
pub struct ValidationRevert {
    /// Paymaster that caused the revert, if attributable
    pub paymaster: Option<Address>,
    /// Revert reason reported by the entry point
    pub reason: String,
}

/// Structured revert from a `handleOps` estimate or submission, attributing
/// the failure to one operation in the batch.
#[derive(Debug, Clone)]
pub struct HandleOpsRevert {
    /// Index of the offending operation within the batch
    pub op_index: usize,
    /// Paymaster that caused the revert, if attributable
    pub paymaster: Option<Address>,
    /// Revert reason reported by the entry point
    pub reason: String,
}
