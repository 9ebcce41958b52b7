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

use std::fmt;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// The structural role an address plays in a user operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// Smart contract account sending the operation
    Account,
    /// Contract that deploys the account via `init_code`
    Factory,
    /// Contract sponsoring gas via `paymaster_and_data`
    Paymaster,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityType::Account => write!(f, "account"),
            EntityType::Factory => write!(f, "factory"),
            EntityType::Paymaster => write!(f, "paymaster"),
        }
    }
}

/// An address paired with the role it plays in a user operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// The role of the entity
    pub kind: EntityType,
    /// The address of the entity
    pub address: Address,
}

impl Entity {
    /// Create a new entity of the given kind
    pub fn new(kind: EntityType, address: Address) -> Self {
        Self { kind, address }
    }

    /// Create a sender entity
    pub fn account(address: Address) -> Self {
        Self::new(EntityType::Account, address)
    }

    /// Create a factory entity
    pub fn factory(address: Address) -> Self {
        Self::new(EntityType::Factory, address)
    }

    /// Create a paymaster entity
    pub fn paymaster(address: Address) -> Self {
        Self::new(EntityType::Paymaster, address)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.kind, self.address)
    }
}
