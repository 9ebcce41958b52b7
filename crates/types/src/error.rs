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

use crate::{entity::Entity, validation::ValidationRevert};

/// Mempool result type.
pub type MempoolResult<T> = std::result::Result<T, MempoolError>;

/// Admission and pool error type. Every variant other than `Other` is a
/// client-facing rejection and leaves pool and reputation state untouched.
#[derive(Debug, thiserror::Error)]
pub enum MempoolError {
    /// Some other error occurred
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    /// Operation with the same sender/nonce already in pool and the
    /// replacement operation does not raise the priority fee.
    #[error("sender has op in mempool with same or higher priority fee: {0}")]
    ReplacementUnderpriced(U256),
    /// Replacement operation raised the priority fee without raising the max
    /// fee by at least the same amount.
    #[error("replacement op must raise max fee to at least {0}")]
    ReplacementFeeIncreaseTooLow(U256),
    /// An entity associated with the operation is throttled or banned.
    #[error("entity {0} is throttled/banned")]
    ThrottledOrBanned(Entity),
    /// Max pending operations reached for an unstaked entity
    #[error("unstaked entity {1} exceeds pending ops limit of {0}")]
    MaxOperationsReached(u64, Entity),
    /// Max fee per gas does not cover the current base fee
    #[error("max fee per gas {0} is below current base fee {1}")]
    MaxFeeTooLow(U256, U256),
    /// Sender account state is inconsistent with the supplied init code
    #[error("{0}")]
    InvalidSender(String),
    /// Operation was rejected during validation simulation
    #[error("operation rejected during simulation: {}", .0.reason)]
    SimulationRejected(ValidationRevert),
    /// An unknown entry point was specified
    #[error("entry point {0:?} is not supported")]
    UnknownEntryPoint(Address),
}
