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
    collections::HashMap,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use ethers::types::H256;
use parking_lot::Mutex;

use crate::{BatchHandler, BatchHandlerContext};

/// Drops operations that have been pending for longer than the TTL.
///
/// Tracks the first time each operation hash is observed in a batch; an
/// operation seen again after the TTL has elapsed is marked for removal.
pub struct DropExpired {
    ttl: Duration,
    seen_at: Mutex<HashMap<H256, Instant>>,
}

impl DropExpired {
    /// Create the stage with a time-to-live for pending operations.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen_at: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BatchHandler for DropExpired {
    async fn handle(&self, ctx: &mut BatchHandlerContext) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut seen_at = self.seen_at.lock();

        for index in (0..ctx.batch.len()).rev() {
            let hash = ctx.batch[index].hash(ctx.entry_point, ctx.chain_id);
            match seen_at.get(&hash) {
                None => {
                    seen_at.insert(hash, now);
                }
                Some(first_seen) if now.duration_since(*first_seen) > self.ttl => {
                    seen_at.remove(&hash);
                    ctx.mark_op_index_for_removal(index);
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ethers::types::Address;
    use hopper_types::UserOperation;

    use super::*;

    fn ctx_with(batch: Vec<UserOperation>) -> BatchHandlerContext {
        BatchHandlerContext::new(&batch, Address::random(), 1, 0.into(), 0.into())
    }

    fn op() -> UserOperation {
        UserOperation {
            sender: Address::random(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn fresh_ops_are_kept() {
        let stage = DropExpired::new(Duration::from_secs(60));
        let mut ctx = ctx_with(vec![op(), op()]);

        stage.handle(&mut ctx).await.unwrap();
        assert_eq!(ctx.batch.len(), 2);
        assert!(ctx.pending_removal.is_empty());
    }

    #[tokio::test]
    async fn stale_ops_are_dropped() {
        let stage = DropExpired::new(Duration::from_millis(10));
        let expiring = op();
        let entry_point = Address::random();

        let mut first = BatchHandlerContext::new(
            &[expiring.clone()],
            entry_point,
            1,
            0.into(),
            0.into(),
        );
        stage.handle(&mut first).await.unwrap();
        assert_eq!(first.batch.len(), 1);

        std::thread::sleep(Duration::from_millis(20));

        let mut second = BatchHandlerContext::new(
            &[expiring.clone()],
            entry_point,
            1,
            0.into(),
            0.into(),
        );
        stage.handle(&mut second).await.unwrap();
        assert!(second.batch.is_empty());
        assert_eq!(second.pending_removal, vec![expiring]);
    }
}
