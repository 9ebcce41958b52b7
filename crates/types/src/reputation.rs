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

use ethers::types::Address;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Reputation status for an entity
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReputationStatus {
    /// Entity is not throttled or banned
    Ok,
    /// Entity is throttled
    Throttled,
    /// Entity is banned
    Banned,
}

impl Serialize for ReputationStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            ReputationStatus::Ok => serializer.serialize_str("ok"),
            ReputationStatus::Throttled => serializer.serialize_str("throttled"),
            ReputationStatus::Banned => serializer.serialize_str("banned"),
        }
    }
}

impl<'de> Deserialize<'de> for ReputationStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.as_str() {
            "ok" => Ok(ReputationStatus::Ok),
            "throttled" => Ok(ReputationStatus::Throttled),
            "banned" => Ok(ReputationStatus::Banned),
            _ => Err(de::Error::custom(format!("Invalid reputation status {s}"))),
        }
    }
}

/// The reputation of an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reputation {
    /// The entity's address
    pub address: Address,
    /// The entity's reputation status
    pub status: ReputationStatus,
    /// Number of ops seen in the current interval
    pub ops_seen: u64,
    /// Number of ops included in the current interval
    pub ops_included: u64,
}

/// Operator-supplied counter values for an entity, applied verbatim and
/// bypassing decay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationOverride {
    /// The entity's address
    pub address: Address,
    /// Number of ops seen
    pub ops_seen: u64,
    /// Number of ops included
    pub ops_included: u64,
}

/// Constants controlling admission of user operations by entity status.
#[derive(Debug, Clone, Copy)]
pub struct ReputationParams {
    /// Minimum unstake delay, in seconds, for a stake to count
    pub min_unstake_delay: u64,
    /// Minimum stake, in wei, for a stake to count
    pub min_stake_value: u64,
    /// Max pending ops for an unstaked sender
    pub same_sender_mempool_count: u64,
    /// Max pending ops referencing the same unstaked factory or paymaster
    pub same_unstaked_entity_mempool_count: u64,
    /// Max pending ops for a throttled entity
    pub throttled_entity_mempool_count: u64,
    /// Max blocks a throttled entity's op may stay pending
    pub throttled_entity_live_blocks: u64,
    /// Max ops from a throttled entity per bundle
    pub throttled_entity_bundle_count: u64,
    /// Denominator of the expected inclusion rate
    pub min_inclusion_rate_denominator: u64,
    /// Slack before an entity is throttled
    pub throttling_slack: u64,
    /// Slack before an entity is banned
    pub ban_slack: u64,
}

impl Default for ReputationParams {
    fn default() -> Self {
        Self {
            min_unstake_delay: 86_400,
            min_stake_value: 2_000_000_000_000_000,
            same_sender_mempool_count: 4,
            same_unstaked_entity_mempool_count: 11,
            throttled_entity_mempool_count: 4,
            throttled_entity_live_blocks: 10,
            throttled_entity_bundle_count: 4,
            min_inclusion_rate_denominator: 10,
            throttling_slack: 10,
            ban_slack: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serde_round_trip() {
        for status in [
            ReputationStatus::Ok,
            ReputationStatus::Throttled,
            ReputationStatus::Banned,
        ] {
            let encoded = serde_json::to_string(&status).unwrap();
            let decoded: ReputationStatus = serde_json::from_str(&encoded).unwrap();
            assert_eq!(status, decoded);
        }
    }

    #[test]
    fn status_rejects_unknown_value() {
        assert!(serde_json::from_str::<ReputationStatus>("\"paused\"").is_err());
    }
}
