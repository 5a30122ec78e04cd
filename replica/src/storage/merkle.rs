//! Merkle root over the ledger keyspace.
//!
//! Behavior:
//! - Leaves are `(key, value)` pairs taken in ascending key order.
//! - An empty keyspace yields the all-zero hash.
//! - Odd layers are padded by duplicating the last node before hashing the pair.
//! - Leaf and interior hashes are domain-separated.
//!
//! Every replica must compute exactly the same root for the same balances,
//! so nothing here may depend on insertion order or storage layout.

use crate::types::Hash256;

const LEAF_SEPARATION: &[u8] = b"VIDA_LEDGER_LEAF";
const NODE_SEPARATION: &[u8] = b"VIDA_LEDGER_NODE";

/// Hashes one `(key, value)` leaf.
pub(crate) fn hash_leaf(key: &[u8], value: &[u8]) -> Hash256 {
    let mut h = blake3::Hasher::new();
    h.update(LEAF_SEPARATION);
    h.update(&(key.len() as u64).to_be_bytes());
    h.update(key);
    h.update(value);
    Hash256(*h.finalize().as_bytes())
}

fn hash_pair(left: &Hash256, right: &Hash256) -> Hash256 {
    let mut h = blake3::Hasher::new();
    h.update(NODE_SEPARATION);
    h.update(left.as_bytes());
    h.update(right.as_bytes());
    Hash256(*h.finalize().as_bytes())
}

/// Computes the root from pre-hashed leaves, reducing in place.
pub fn root_from_leaves(mut nodes: Vec<Hash256>) -> Hash256 {
    if nodes.is_empty() {
        return Hash256::ZERO;
    }

    let mut len = nodes.len();
    while len > 1 {
        let mut write = 0;
        let mut read = 0;

        while read < len {
            let left = nodes[read];
            let right = if read + 1 < len { nodes[read + 1] } else { left };
            nodes[write] = hash_pair(&left, &right);
            write += 1;
            read += 2;
        }

        len = write;
    }

    nodes[0]
}

/// Computes the ledger root from entries that are already sorted by key.
///
/// Callers iterate a `BTreeMap` or a RocksDB column family, both of which
/// yield keys in ascending byte order.
pub fn ledger_root<'a, I>(sorted_entries: I) -> Hash256
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let leaves = sorted_entries
        .into_iter()
        .map(|(k, v)| hash_leaf(k, v))
        .collect();
    root_from_leaves(leaves)
}
