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

//! Core domain types for the Hopper ERC-4337 bundler.

mod entity;
pub use entity::{Entity, EntityType};

mod error;
pub use error::{MempoolError, MempoolResult};

mod reputation;
pub use reputation::{Reputation, ReputationOverride, ReputationParams, ReputationStatus};

mod user_operation;
pub use user_operation::{UserOperation, UserOperationId};

mod validation;
pub use validation::{DepositInfo, HandleOpsRevert, ValidationOutput, ValidationRevert};
