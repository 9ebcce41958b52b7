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

use ethers::{
    abi::{self, Token},
    types::{Address, Bytes, H256, U256},
    utils::keccak256,
};
use serde::{Deserialize, Serialize};

use crate::entity::Entity;

/// An ERC-4337 style transaction for a smart contract account.
///
/// Treated as immutable once admitted to the pool. Replacement creates a new
/// value; the pool never mutates fields in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Account making the operation
    pub sender: Address,
    /// Anti-replay parameter, unique per sender
    pub nonce: U256,
    /// Factory address and calldata used to deploy the sender, empty if deployed
    pub init_code: Bytes,
    /// Data passed to the sender during the execution call
    pub call_data: Bytes,
    /// Gas limit for the execution call
    pub call_gas_limit: U256,
    /// Gas limit for the validation call
    pub verification_gas_limit: U256,
    /// Gas to compensate the bundler for pre-verification work
    pub pre_verification_gas: U256,
    /// Maximum fee per gas, EIP-1559 style
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas, EIP-1559 style
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address and extra context, empty if the sender pays
    pub paymaster_and_data: Bytes,
    /// Signature over the operation hash
    pub signature: Bytes,
}

/// Unique identifier of a pending operation: at most one live operation per id
/// exists in the pool for a given entry point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct UserOperationId {
    /// Sender of the operation
    pub sender: Address,
    /// Nonce of the operation
    pub nonce: U256,
}

impl UserOperation {
    /// Identifier of this operation within the pool
    pub fn id(&self) -> UserOperationId {
        UserOperationId {
            sender: self.sender,
            nonce: self.nonce,
        }
    }

    /// The factory address from `init_code`, if present. Zero addresses read
    /// as unset.
    pub fn factory(&self) -> Option<Address> {
        entity_address(&self.init_code)
    }

    /// The paymaster address from `paymaster_and_data`, if present. Zero
    /// addresses read as unset.
    pub fn paymaster(&self) -> Option<Address> {
        entity_address(&self.paymaster_and_data)
    }

    /// All entities referenced by this operation
    pub fn entities(&self) -> Vec<Entity> {
        let mut entities = vec![Entity::account(self.sender)];
        if let Some(factory) = self.factory() {
            entities.push(Entity::factory(factory));
        }
        if let Some(paymaster) = self.paymaster() {
            entities.push(Entity::paymaster(paymaster));
        }
        entities
    }

    /// Request identifier of the operation: the hash of the operation fields
    /// (excluding signature) combined with the entry point address and chain id.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> H256 {
        let mut buf = [0u8; 96];
        buf[..32].copy_from_slice(&keccak256(self.pack_for_hash()));
        buf[44..64].copy_from_slice(entry_point.as_bytes());
        U256::from(chain_id).to_big_endian(&mut buf[64..96]);
        H256::from(keccak256(buf))
    }

    /// Upper bound on the gas this operation can consume on-chain.
    ///
    /// The verification gas limit is charged up to three times when a
    /// paymaster participates (account validation, paymaster validation,
    /// post-op).
    pub fn max_gas_available(&self) -> U256 {
        let multiplier: U256 = if self.paymaster().is_some() { 3 } else { 1 }.into();
        self.verification_gas_limit * multiplier + self.pre_verification_gas + self.call_gas_limit
    }

    // ABI encoding of the operation with an empty signature, stripped of the
    // leading tuple offset word and the trailing empty-signature length word.
    fn pack_for_hash(&self) -> Vec<u8> {
        let packed = abi::encode(&[Token::Tuple(vec![
            Token::Address(self.sender),
            Token::Uint(self.nonce),
            Token::Bytes(self.init_code.to_vec()),
            Token::Bytes(self.call_data.to_vec()),
            Token::Uint(self.call_gas_limit),
            Token::Uint(self.verification_gas_limit),
            Token::Uint(self.pre_verification_gas),
            Token::Uint(self.max_fee_per_gas),
            Token::Uint(self.max_priority_fee_per_gas),
            Token::Bytes(self.paymaster_and_data.to_vec()),
            Token::Bytes(vec![]),
        ])]);
        packed[32..packed.len() - 32].to_vec()
    }
}

fn entity_address(data: &[u8]) -> Option<Address> {
    if data.len() < 20 {
        return None;
    }
    let address = Address::from_slice(&data[..20]);
    (!address.is_zero()).then_some(address)
}

#[cfg(test)]
mod tests {
    use crate::EntityType;

    use super::*;

    fn test_op() -> UserOperation {
        UserOperation {
            sender: Address::random(),
            nonce: 1.into(),
            call_gas_limit: 100_000.into(),
            verification_gas_limit: 50_000.into(),
            pre_verification_gas: 21_000.into(),
            max_fee_per_gas: 100.into(),
            max_priority_fee_per_gas: 5.into(),
            ..Default::default()
        }
    }

    #[test]
    fn factory_from_init_code() {
        let factory = Address::random();
        let mut op = test_op();
        assert_eq!(op.factory(), None);

        let mut init_code = factory.as_bytes().to_vec();
        init_code.extend_from_slice(&[0xab; 4]);
        op.init_code = init_code.into();
        assert_eq!(op.factory(), Some(factory));
    }

    #[test]
    fn paymaster_from_paymaster_and_data() {
        let paymaster = Address::random();
        let mut op = test_op();
        assert_eq!(op.paymaster(), None);

        op.paymaster_and_data = paymaster.as_bytes().to_vec().into();
        assert_eq!(op.paymaster(), Some(paymaster));
    }

    #[test]
    fn short_init_code_has_no_factory() {
        let mut op = test_op();
        op.init_code = vec![0x01; 19].into();
        assert_eq!(op.factory(), None);
    }

    #[test]
    fn zero_address_entities_are_unset() {
        let mut op = test_op();
        op.init_code = vec![0x00; 20].into();
        op.paymaster_and_data = vec![0x00; 24].into();
        assert_eq!(op.factory(), None);
        assert_eq!(op.paymaster(), None);
        assert_eq!(op.entities().len(), 1);
    }

    #[test]
    fn entities_cover_all_roles() {
        let mut op = test_op();
        op.init_code = Address::random().as_bytes().to_vec().into();
        op.paymaster_and_data = Address::random().as_bytes().to_vec().into();

        let entities = op.entities();
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].kind, EntityType::Account);
        assert_eq!(entities[0].address, op.sender);
        assert_eq!(entities[1].kind, EntityType::Factory);
        assert_eq!(entities[2].kind, EntityType::Paymaster);
    }

    #[test]
    fn hash_is_deterministic() {
        let op = test_op();
        let entry_point = Address::random();
        assert_eq!(op.hash(entry_point, 1), op.hash(entry_point, 1));
    }

    #[test]
    fn hash_varies_with_entry_point_and_chain() {
        let op = test_op();
        let entry_point = Address::random();
        assert_ne!(op.hash(entry_point, 1), op.hash(Address::random(), 1));
        assert_ne!(op.hash(entry_point, 1), op.hash(entry_point, 5));
    }

    #[test]
    fn hash_ignores_signature() {
        let mut op = test_op();
        let entry_point = Address::random();
        let hash = op.hash(entry_point, 1);
        op.signature = vec![0xff; 65].into();
        assert_eq!(op.hash(entry_point, 1), hash);
    }

    #[test]
    fn max_gas_triples_verification_with_paymaster() {
        let mut op = test_op();
        let base: U256 = (50_000 + 21_000 + 100_000).into();
        assert_eq!(op.max_gas_available(), base);

        op.paymaster_and_data = Address::random().as_bytes().to_vec().into();
        assert_eq!(op.max_gas_available(), base + U256::from(2 * 50_000));
    }

    #[test]
    fn json_round_trip() {
        let mut op = test_op();
        op.init_code = Address::random().as_bytes().to_vec().into();
        op.signature = vec![0x01, 0x02].into();

        let encoded = serde_json::to_string(&op).unwrap();
        assert!(encoded.contains("maxFeePerGas"));
        let decoded: UserOperation = serde_json::from_str(&encoded).unwrap();
        assert_eq!(op, decoded);
    }
}
