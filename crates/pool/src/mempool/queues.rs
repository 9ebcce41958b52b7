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

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use ethers::types::{Address, U256};
use hopper_types::{UserOperation, UserOperationId};

/// Wrapper around a pooled operation that records its insertion rank.
#[derive(Debug, Clone)]
struct OrderedPoolOperation {
    op: Arc<UserOperation>,
    submission_id: u64,
}

/// Index set for one entry point. Every mutation updates all three indexes
/// before returning, so readers never observe one updated and another stale.
#[derive(Debug, Default)]
struct EntryPointQueue {
    /// Operations by id, at most one live operation per id
    by_id: HashMap<UserOperationId, OrderedPoolOperation>,
    /// Global arrival order, keyed by insertion rank
    arrival: BTreeMap<u64, Arc<UserOperation>>,
    /// Per-sender ordering, keyed by nonce
    by_sender: HashMap<Address, BTreeMap<U256, Arc<UserOperation>>>,
    /// Insertion rank counter
    submission_id: u64,
}

/// In-memory indexes over pending operations, scoped by entry point.
#[derive(Debug, Default)]
pub(crate) struct UserOpQueues {
    by_entry_point: HashMap<Address, EntryPointQueue>,
}

impl UserOpQueues {
    /// Insert an operation, replacing any live operation with the same id.
    /// A replacement takes a fresh insertion rank.
    pub(crate) fn add_op(&mut self, entry_point: Address, op: UserOperation) {
        let queue = self.by_entry_point.entry(entry_point).or_default();
        let op = Arc::new(op);
        let id = op.id();

        if let Some(prev) = queue.by_id.remove(&id) {
            queue.arrival.remove(&prev.submission_id);
        }

        let submission_id = queue.submission_id;
        queue.submission_id += 1;

        queue.arrival.insert(submission_id, op.clone());
        queue
            .by_sender
            .entry(op.sender)
            .or_default()
            .insert(op.nonce, op.clone());
        queue.by_id.insert(id, OrderedPoolOperation { op, submission_id });
    }

    /// Remove the operation with the given id. Removing an absent id is a
    /// no-op; returns whether anything was removed.
    pub(crate) fn remove_op(&mut self, entry_point: Address, id: &UserOperationId) -> bool {
        let Some(queue) = self.by_entry_point.get_mut(&entry_point) else {
            return false;
        };
        let Some(prev) = queue.by_id.remove(id) else {
            return false;
        };

        queue.arrival.remove(&prev.submission_id);
        if let Some(sender_ops) = queue.by_sender.get_mut(&id.sender) {
            sender_ops.remove(&id.nonce);
            if sender_ops.is_empty() {
                queue.by_sender.remove(&id.sender);
            }
        }
        true
    }

    /// All live operations for a sender, nonce-ascending.
    pub(crate) fn ops_by_sender(&self, entry_point: Address, sender: Address) -> Vec<UserOperation> {
        self.by_entry_point
            .get(&entry_point)
            .and_then(|queue| queue.by_sender.get(&sender))
            .map(|ops| ops.values().map(|op| (**op).clone()).collect())
            .unwrap_or_default()
    }

    /// All live operations in global arrival order.
    pub(crate) fn arrival_order(&self, entry_point: Address) -> Vec<UserOperation> {
        self.by_entry_point
            .get(&entry_point)
            .map(|queue| queue.arrival.values().map(|op| (**op).clone()).collect())
            .unwrap_or_default()
    }

    /// Number of live operations for an entry point.
    pub(crate) fn count(&self, entry_point: Address) -> usize {
        self.by_entry_point
            .get(&entry_point)
            .map(|queue| queue.by_id.len())
            .unwrap_or_default()
    }

    /// Drop every index.
    pub(crate) fn clear(&mut self) {
        self.by_entry_point.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_op(sender: Address, nonce: u64, max_priority_fee_per_gas: u64) -> UserOperation {
        UserOperation {
            sender,
            nonce: nonce.into(),
            max_fee_per_gas: (max_priority_fee_per_gas + 10).into(),
            max_priority_fee_per_gas: max_priority_fee_per_gas.into(),
            ..Default::default()
        }
    }

    #[test]
    fn arrival_order_is_fifo() {
        let mut queues = UserOpQueues::default();
        let entry_point = Address::random();
        let ops = vec![
            create_op(Address::random(), 0, 30),
            create_op(Address::random(), 0, 10),
            create_op(Address::random(), 0, 20),
        ];

        for op in &ops {
            queues.add_op(entry_point, op.clone());
        }

        // insertion order regardless of fees
        assert_eq!(queues.arrival_order(entry_point), ops);
    }

    #[test]
    fn ops_by_sender_is_nonce_ascending() {
        let mut queues = UserOpQueues::default();
        let entry_point = Address::random();
        let sender = Address::random();

        queues.add_op(entry_point, create_op(sender, 2, 1));
        queues.add_op(entry_point, create_op(sender, 0, 1));
        queues.add_op(entry_point, create_op(sender, 1, 1));
        queues.add_op(entry_point, create_op(Address::random(), 0, 1));

        let nonces: Vec<U256> = queues
            .ops_by_sender(entry_point, sender)
            .iter()
            .map(|op| op.nonce)
            .collect();
        assert_eq!(nonces, vec![0.into(), 1.into(), 2.into()]);
    }

    #[test]
    fn replacement_leaves_exactly_one_op() {
        let mut queues = UserOpQueues::default();
        let entry_point = Address::random();
        let sender = Address::random();

        queues.add_op(entry_point, create_op(sender, 0, 5));
        let replacement = create_op(sender, 0, 6);
        queues.add_op(entry_point, replacement.clone());

        assert_eq!(queues.count(entry_point), 1);
        assert_eq!(queues.ops_by_sender(entry_point, sender), vec![replacement.clone()]);
        assert_eq!(queues.arrival_order(entry_point), vec![replacement]);
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut queues = UserOpQueues::default();
        let entry_point = Address::random();
        let op = create_op(Address::random(), 0, 1);

        assert!(!queues.remove_op(entry_point, &op.id()));

        queues.add_op(entry_point, op.clone());
        assert!(queues.remove_op(entry_point, &op.id()));
        assert!(!queues.remove_op(entry_point, &op.id()));
        assert_eq!(queues.count(entry_point), 0);
    }

    #[test]
    fn entry_points_are_isolated() {
        let mut queues = UserOpQueues::default();
        let ep1 = Address::random();
        let ep2 = Address::random();
        let op = create_op(Address::random(), 0, 1);

        queues.add_op(ep1, op.clone());
        assert_eq!(queues.count(ep1), 1);
        assert_eq!(queues.count(ep2), 0);
        assert!(queues.arrival_order(ep2).is_empty());
        assert!(queues.ops_by_sender(ep2, op.sender).is_empty());
    }

    #[test]
    fn remove_updates_all_indexes() {
        let mut queues = UserOpQueues::default();
        let entry_point = Address::random();
        let sender = Address::random();

        queues.add_op(entry_point, create_op(sender, 0, 1));
        queues.add_op(entry_point, create_op(sender, 1, 1));

        let first = create_op(sender, 0, 1);
        queues.remove_op(entry_point, &first.id());

        assert_eq!(queues.count(entry_point), 1);
        assert_eq!(queues.arrival_order(entry_point).len(), 1);
        let remaining = queues.ops_by_sender(entry_point, sender);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].nonce, 1.into());
    }
}
