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

//! Persisted mempool record layout and startup replay.
//!
//! One record per sender per entry point:
//! `mempool:<entryPoint>:<sender>` -> JSON `[operation, entryPointHex]`.
//! Nonce-level history is not separately keyed; a replacement overwrites.

use anyhow::Context;
use ethers::types::Address;
use hopper_db::Store;
use hopper_types::UserOperation;

use super::queues::UserOpQueues;

const KEY_PREFIX: &str = "mempool";
const KEY_SEPARATOR: &str = ":";

/// Prefix under which all mempool records live.
pub(crate) fn key_prefix() -> Vec<u8> {
    format!("{KEY_PREFIX}{KEY_SEPARATOR}").into_bytes()
}

/// Storage key for a sender's record under an entry point.
pub(crate) fn op_key(entry_point: Address, sender: Address) -> Vec<u8> {
    format!("{KEY_PREFIX}{KEY_SEPARATOR}{entry_point:?}{KEY_SEPARATOR}{sender:?}").into_bytes()
}

/// Encode a record value.
pub(crate) fn encode_record(
    op: &UserOperation,
    entry_point: Address,
) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&(op, format!("{entry_point:?}")))
}

fn decode_record(value: &[u8]) -> anyhow::Result<(UserOperation, Address)> {
    let (op, entry_point): (UserOperation, String) = serde_json::from_slice(value)?;
    let entry_point = entry_point
        .parse()
        .context("record entry point is not an address")?;
    Ok((op, entry_point))
}

/// Rebuild the in-memory indexes from every persisted record.
///
/// A record that fails to decode aborts the replay: starting with a partial
/// pool would silently drop operations that were durably accepted.
pub(crate) fn replay(store: &Store, queues: &mut UserOpQueues) -> anyhow::Result<usize> {
    let records = store
        .prefix_scan(&key_prefix())
        .context("failed to scan mempool records")?;

    let count = records.len();
    for (key, value) in records {
        let (op, entry_point) = decode_record(&value).with_context(|| {
            format!(
                "failed to decode mempool record {}",
                String::from_utf8_lossy(&key)
            )
        })?;
        queues.add_op(entry_point, op);
    }
    Ok(count)
}
