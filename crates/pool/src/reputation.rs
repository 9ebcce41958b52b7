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

//! Decaying per-entity reputation counters.
//!
//! Counters live in the shared store at `entity:opsCount:<address>` as
//! colon-joined decimals `opsSeen:opsIncluded:lastUpdatedUnixSeconds`.
//! Records are created lazily on first observation and decayed lazily on
//! read; there is no background sweep.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::Context;
use ethers::types::Address;
use hopper_db::{Store, StoreError, StoreResult, Txn};
use hopper_types::{
    MempoolResult, Reputation, ReputationOverride, ReputationParams, ReputationStatus,
};

const OPS_COUNT_PREFIX: &str = "entity:opsCount";

// Counters below this floor are exempt from decay.
const DECAY_FLOOR: u64 = 24;
// Hourly decay divisor, a 24-hour-half-life style exponential average.
const DECAY_HOURS: u64 = 24;

fn ops_count_key(address: Address) -> Vec<u8> {
    format!("{OPS_COUNT_PREFIX}:{address:?}").into_bytes()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpsCount {
    ops_seen: u64,
    ops_included: u64,
    last_updated: u64,
}

impl OpsCount {
    fn zero(now: u64) -> Self {
        Self {
            ops_seen: 0,
            ops_included: 0,
            last_updated: now,
        }
    }

    fn encode(&self) -> Vec<u8> {
        format!("{}:{}:{}", self.ops_seen, self.ops_included, self.last_updated).into_bytes()
    }

    fn decode(value: &[u8]) -> StoreResult<Self> {
        let text = std::str::from_utf8(value)
            .map_err(|_| StoreError::Corrupt("ops count is not utf-8".to_string()))?;
        let mut fields = text.split(':');
        let mut next = || {
            fields
                .next()
                .and_then(|field| field.parse::<u64>().ok())
                .ok_or_else(|| StoreError::Corrupt(format!("bad ops count record: {text}")))
        };
        Ok(Self {
            ops_seen: next()?,
            ops_included: next()?,
            last_updated: next()?,
        })
    }

    /// Apply one round of decay per whole hour elapsed, stopping once both
    /// counters fall below the floor. Returns whether anything changed.
    fn decay(&mut self, now: u64) -> bool {
        let hours = now.saturating_sub(self.last_updated) / 3600;
        let mut changed = false;
        for _ in 0..hours {
            if self.ops_seen < DECAY_FLOOR && self.ops_included < DECAY_FLOOR {
                break;
            }
            self.ops_seen -= self.ops_seen / DECAY_HOURS;
            self.ops_included -= self.ops_included / DECAY_HOURS;
            changed = true;
        }
        if changed {
            self.last_updated = now;
        }
        changed
    }
}

/// Store-backed reputation tracker for every entity seen in a user operation.
pub struct ReputationTracker {
    store: Arc<Store>,
    params: ReputationParams,
}

impl ReputationTracker {
    /// Create a tracker over the shared store.
    pub fn new(store: Arc<Store>, params: ReputationParams) -> Self {
        Self { store, params }
    }

    /// The configured reputation constants.
    pub fn params(&self) -> &ReputationParams {
        &self.params
    }

    /// Current status for an entity, decaying its counters first.
    pub fn status(&self, address: Address) -> MempoolResult<ReputationStatus> {
        let now = unix_now();
        let count = self
            .store
            .update(|txn| self.read_decayed(txn, address, now))
            .context("failed to read entity reputation")?;
        Ok(self.derive_status(&count))
    }

    /// Record that ops from the given entities entered the pool. One
    /// transaction for the whole set.
    pub fn add_seen(&self, entities: impl IntoIterator<Item = Address>) -> MempoolResult<()> {
        let now = unix_now();
        self.store
            .update(|txn| {
                for address in entities {
                    let mut count = self.read_decayed(txn, address, now)?;
                    count.ops_seen += 1;
                    count.last_updated = now;
                    txn.put(ops_count_key(address), count.encode())?;
                }
                Ok(())
            })
            .context("failed to increment ops seen")?;
        Ok(())
    }

    /// Record on-chain inclusion counts per entity, in one transaction.
    pub fn add_included(&self, counts: &HashMap<Address, u64>) -> MempoolResult<()> {
        let now = unix_now();
        self.store
            .update(|txn| {
                for (&address, &included) in counts {
                    let mut count = self.read_decayed(txn, address, now)?;
                    count.ops_included += included;
                    count.last_updated = now;
                    txn.put(ops_count_key(address), count.encode())?;
                }
                Ok(())
            })
            .context("failed to increment ops included")?;
        Ok(())
    }

    /// Set counters directly, bypassing decay. Operator correction only.
    pub fn set_overrides(&self, entries: &[ReputationOverride]) -> MempoolResult<()> {
        let now = unix_now();
        self.store
            .update(|txn| {
                for entry in entries {
                    let count = OpsCount {
                        ops_seen: entry.ops_seen,
                        ops_included: entry.ops_included,
                        last_updated: now,
                    };
                    txn.put(ops_count_key(entry.address), count.encode())?;
                }
                Ok(())
            })
            .context("failed to override reputation")?;
        Ok(())
    }

    /// Snapshot of every tracked entity with its derived status. Decay is
    /// applied to the returned values but not persisted.
    pub fn dump(&self) -> MempoolResult<Vec<Reputation>> {
        let now = unix_now();
        let records = self
            .store
            .prefix_scan(format!("{OPS_COUNT_PREFIX}:").as_bytes())
            .context("failed to scan reputation records")?;

        let mut reputations = Vec::with_capacity(records.len());
        for (key, value) in records {
            let address =
                decode_address_from_key(&key).context("failed to decode reputation key")?;
            let mut count = OpsCount::decode(&value).context("failed to decode ops count")?;
            count.decay(now);
            reputations.push(Reputation {
                address,
                status: self.derive_status(&count),
                ops_seen: count.ops_seen,
                ops_included: count.ops_included,
            });
        }
        Ok(reputations)
    }

    // Read an entity's counters inside a transaction, applying and persisting
    // any pending decay. Missing records read as zero without being created.
    fn read_decayed(&self, txn: &Txn<'_>, address: Address, now: u64) -> StoreResult<OpsCount> {
        let key = ops_count_key(address);
        let Some(value) = txn.get(&key)? else {
            return Ok(OpsCount::zero(now));
        };

        let mut count = OpsCount::decode(&value)?;
        if count.decay(now) {
            txn.put(&key, count.encode())?;
        }
        Ok(count)
    }

    fn derive_status(&self, count: &OpsCount) -> ReputationStatus {
        if count.ops_seen == 0 {
            return ReputationStatus::Ok;
        }

        let min_expected_included = count.ops_seen / self.params.min_inclusion_rate_denominator;
        if min_expected_included <= count.ops_included + self.params.throttling_slack {
            ReputationStatus::Ok
        } else if min_expected_included <= count.ops_included + self.params.ban_slack {
            ReputationStatus::Throttled
        } else {
            ReputationStatus::Banned
        }
    }
}

impl std::fmt::Debug for ReputationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReputationTracker")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

fn decode_address_from_key(key: &[u8]) -> StoreResult<Address> {
    std::str::from_utf8(key)
        .ok()
        .and_then(|text| text.rsplit(':').next())
        .and_then(|hex| hex.parse().ok())
        .ok_or_else(|| {
            StoreError::Corrupt(format!(
                "bad ops count key: {}",
                String::from_utf8_lossy(key)
            ))
        })
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time should be after epoch")
        .as_secs()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_tracker() -> (TempDir, ReputationTracker) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        (dir, ReputationTracker::new(store, ReputationParams::default()))
    }

    fn write_raw(tracker: &ReputationTracker, address: Address, count: OpsCount) {
        tracker
            .store
            .put(&ops_count_key(address), &count.encode())
            .unwrap();
    }

    #[test]
    fn ops_count_round_trip() {
        let count = OpsCount {
            ops_seen: 120,
            ops_included: 11,
            last_updated: 1_700_000_000,
        };
        assert_eq!(OpsCount::decode(&count.encode()).unwrap(), count);
        assert!(OpsCount::decode(b"1:2").is_err());
        assert!(OpsCount::decode(b"a:b:c").is_err());
    }

    #[test]
    fn unseen_entity_is_ok() {
        let (_dir, tracker) = open_tracker();
        assert_eq!(
            tracker.status(Address::random()).unwrap(),
            ReputationStatus::Ok
        );
    }

    #[test]
    fn add_seen_creates_lazily() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        tracker.add_seen([address]).unwrap();
        tracker.add_seen([address]).unwrap();

        let dump = tracker.dump().unwrap();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].address, address);
        assert_eq!(dump[0].ops_seen, 2);
        assert_eq!(dump[0].ops_included, 0);
    }

    #[test]
    fn add_included_batches_counts() {
        let (_dir, tracker) = open_tracker();
        let a = Address::random();
        let b = Address::random();

        let counts = HashMap::from([(a, 3), (b, 1)]);
        tracker.add_included(&counts).unwrap();

        let dump = tracker.dump().unwrap();
        let included_for = |address| {
            dump.iter()
                .find(|r| r.address == address)
                .unwrap()
                .ops_included
        };
        assert_eq!(included_for(a), 3);
        assert_eq!(included_for(b), 1);
    }

    #[test]
    fn status_ordering_never_reverses() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        // fixed ops_included, increasing ops_seen: ok -> throttled -> banned
        let mut last_rank = 0;
        for ops_seen in (0..4000).step_by(100) {
            tracker
                .set_overrides(&[ReputationOverride {
                    address,
                    ops_seen,
                    ops_included: 40,
                }])
                .unwrap();
            let rank = match tracker.status(address).unwrap() {
                ReputationStatus::Ok => 0,
                ReputationStatus::Throttled => 1,
                ReputationStatus::Banned => 2,
            };
            assert!(rank >= last_rank, "status reversed at ops_seen={ops_seen}");
            last_rank = rank;
        }
        assert_eq!(last_rank, 2);
    }

    #[test]
    fn throttle_and_ban_boundaries() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();
        let ops_seen = 1000;
        let min_expected = ops_seen / 10;

        let cases = [
            (min_expected - 10, ReputationStatus::Ok),
            (min_expected - 11, ReputationStatus::Throttled),
            (min_expected - 50, ReputationStatus::Throttled),
            (min_expected - 51, ReputationStatus::Banned),
        ];
        for (ops_included, expected) in cases {
            tracker
                .set_overrides(&[ReputationOverride {
                    address,
                    ops_seen,
                    ops_included,
                }])
                .unwrap();
            assert_eq!(tracker.status(address).unwrap(), expected);
        }
    }

    #[test]
    fn no_decay_below_floor() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        // a week stale, both counters below the floor
        write_raw(
            &tracker,
            address,
            OpsCount {
                ops_seen: 23,
                ops_included: 5,
                last_updated: unix_now() - 7 * 24 * 3600,
            },
        );

        tracker.status(address).unwrap();
        let dump = tracker.dump().unwrap();
        assert_eq!(dump[0].ops_seen, 23);
        assert_eq!(dump[0].ops_included, 5);
    }

    #[test]
    fn decay_shrinks_stale_counters() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        write_raw(
            &tracker,
            address,
            OpsCount {
                ops_seen: 240,
                ops_included: 240,
                last_updated: unix_now() - 3600,
            },
        );

        tracker.status(address).unwrap();
        let dump = tracker.dump().unwrap();
        assert_eq!(dump[0].ops_seen, 240 - 240 / 24);
        assert_eq!(dump[0].ops_included, 240 - 240 / 24);
    }

    #[test]
    fn decay_is_persisted_on_read() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        write_raw(
            &tracker,
            address,
            OpsCount {
                ops_seen: 240,
                ops_included: 0,
                last_updated: unix_now() - 3600,
            },
        );

        tracker.status(address).unwrap();
        let raw = tracker.store.get(&ops_count_key(address)).unwrap().unwrap();
        let stored = OpsCount::decode(&raw).unwrap();
        assert_eq!(stored.ops_seen, 240 - 240 / 24);
        assert!(stored.last_updated >= unix_now() - 2);
    }

    #[test]
    fn override_bypasses_decay() {
        let (_dir, tracker) = open_tracker();
        let address = Address::random();

        tracker
            .set_overrides(&[ReputationOverride {
                address,
                ops_seen: 1000,
                ops_included: 1000,
            }])
            .unwrap();

        let dump = tracker.dump().unwrap();
        assert_eq!(dump[0].ops_seen, 1000);
        assert_eq!(dump[0].ops_included, 1000);
        assert_eq!(dump[0].status, ReputationStatus::Ok);
    }
}
