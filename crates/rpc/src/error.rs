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

use jsonrpsee::types::{error::INTERNAL_ERROR_CODE, ErrorObjectOwned};
use hopper_types::{Entity, MempoolError};

// Custom ERC-4337 error codes
const ENTRYPOINT_VALIDATION_REJECTED_CODE: i32 = -32500;
const PAYMASTER_VALIDATION_REJECTED_CODE: i32 = -32501;
const THROTTLED_OR_BANNED_CODE: i32 = -32504;
const STAKE_TOO_LOW_CODE: i32 = -32505;
const INVALID_FIELDS_CODE: i32 = -32602;
const EXECUTION_REVERTED_CODE: i32 = -32521;

pub(crate) type EthResult<T> = Result<T, EthRpcError>;

/// Error returned by the RPC server eth namespace. Every non-internal
/// variant carries a stable numeric code from the ERC-4337 range.
#[derive(Debug, thiserror::Error)]
pub enum EthRpcError {
    /// Unexpected failure, surfaced with the generic internal error code
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
    /// Invalid request parameters
    #[error("{0}")]
    InvalidParams(String),
    /// Validation rejected the operation in the entry point or during wallet
    /// creation or validation
    #[error("{0}")]
    EntryPointValidationRejected(String),
    /// Paymaster rejected the operation
    #[error("{0}")]
    PaymasterValidationRejected(String),
    /// Entity throttled or banned
    #[error("entity {0} is throttled or banned")]
    ThrottledOrBanned(Entity),
    /// Entity stake is too low for the requested pool occupancy
    #[error("{0}")]
    StakeTooLow(String),
    /// On-chain execution reverted
    #[error("execution reverted: {0}")]
    ExecutionReverted(String),
}

impl EthRpcError {
    fn code(&self) -> i32 {
        match self {
            EthRpcError::Internal(_) => INTERNAL_ERROR_CODE,
            EthRpcError::InvalidParams(_) => INVALID_FIELDS_CODE,
            EthRpcError::EntryPointValidationRejected(_) => ENTRYPOINT_VALIDATION_REJECTED_CODE,
            EthRpcError::PaymasterValidationRejected(_) => PAYMASTER_VALIDATION_REJECTED_CODE,
            EthRpcError::ThrottledOrBanned(_) => THROTTLED_OR_BANNED_CODE,
            EthRpcError::StakeTooLow(_) => STAKE_TOO_LOW_CODE,
            EthRpcError::ExecutionReverted(_) => EXECUTION_REVERTED_CODE,
        }
    }
}

impl From<MempoolError> for EthRpcError {
    fn from(error: MempoolError) -> Self {
        match error {
            MempoolError::Other(source) => EthRpcError::Internal(source),
            MempoolError::ReplacementUnderpriced(_)
            | MempoolError::ReplacementFeeIncreaseTooLow(_)
            | MempoolError::MaxFeeTooLow(_, _)
            | MempoolError::UnknownEntryPoint(_) => EthRpcError::InvalidParams(error.to_string()),
            MempoolError::ThrottledOrBanned(entity) => EthRpcError::ThrottledOrBanned(entity),
            MempoolError::MaxOperationsReached(_, _) => {
                EthRpcError::StakeTooLow(error.to_string())
            }
            MempoolError::InvalidSender(reason) => {
                EthRpcError::EntryPointValidationRejected(reason)
            }
            MempoolError::SimulationRejected(revert) => {
                if revert.paymaster.is_some() {
                    EthRpcError::PaymasterValidationRejected(revert.reason)
                } else {
                    EthRpcError::EntryPointValidationRejected(revert.reason)
                }
            }
        }
    }
}

impl From<EthRpcError> for ErrorObjectOwned {
    fn from(error: EthRpcError) -> Self {
        ErrorObjectOwned::owned(error.code(), error.to_string(), None::<()>)
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::Address;
    use hopper_types::ValidationRevert;

    use super::*;

    #[test]
    fn codes_are_stable() {
        let cases: Vec<(EthRpcError, i32)> = vec![
            (
                MempoolError::ReplacementUnderpriced(5.into()).into(),
                -32602,
            ),
            (
                MempoolError::ThrottledOrBanned(Entity::account(Address::random())).into(),
                -32504,
            ),
            (
                MempoolError::MaxOperationsReached(4, Entity::account(Address::random())).into(),
                -32505,
            ),
            (
                MempoolError::SimulationRejected(ValidationRevert {
                    paymaster: None,
                    reason: "AA23".to_string(),
                })
                .into(),
                -32500,
            ),
            (
                MempoolError::SimulationRejected(ValidationRevert {
                    paymaster: Some(Address::random()),
                    reason: "AA33".to_string(),
                })
                .into(),
                -32501,
            ),
            (
                MempoolError::UnknownEntryPoint(Address::random()).into(),
                -32602,
            ),
        ];

        for (error, expected) in cases {
            let object = ErrorObjectOwned::from(error);
            assert_eq!(object.code(), expected);
        }
    }
}
