//! Complete binary Merkle tree with inclusion proofs.
//!
//! The tree is stored in level order (root at index 0). Leaves are copied
//! left-aligned into the bottom row; trailing slots keep the zero value of
//! the hash type. The pair hasher must treat a zero right child as a
//! pass-through of the left child — `p(l, 0) = l` — which encodes odd-sized
//! levels without duplicating the orphan node.

use keel_types::Hash;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::tx::SigTx;
use keel_crypto::hash_value;

/// Which side of the pair a proof sibling sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// One step of an inclusion proof: the sibling hash and its side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofStep<H> {
    pub hash: H,
    pub side: Side,
}

/// Build a complete binary Merkle tree over a non-empty item sequence.
///
/// Returns the level-order node array; the root is element 0. A single
/// leaf produces a single-node tree.
pub fn merkle_build<T, H, LF, PF>(
    items: &[T],
    leaf_hash: LF,
    pair_hash: PF,
) -> Result<Vec<H>, ChainError>
where
    H: Copy + Default + PartialEq,
    LF: Fn(&T) -> H,
    PF: Fn(&H, &H) -> H,
{
    if items.is_empty() {
        return Err(ChainError::EmptyMerkleTree);
    }

    let width = items.len().next_power_of_two();
    let mut tree = vec![H::default(); 2 * width - 1];
    let leaf_start = width - 1;

    for (i, item) in items.iter().enumerate() {
        tree[leaf_start + i] = leaf_hash(item);
    }
    for parent in (0..leaf_start).rev() {
        tree[parent] = pair_hash(&tree[2 * parent + 1], &tree[2 * parent + 2]);
    }
    Ok(tree)
}

/// The root of a level-order tree built by [`merkle_build`].
pub fn merkle_root<H: Copy>(tree: &[H]) -> H {
    tree[0]
}

/// Build an inclusion proof for `leaf`, walking from the leaf row to the
/// root and collecting the sibling at each level.
pub fn merkle_prove<H>(leaf: H, tree: &[H]) -> Result<Vec<ProofStep<H>>, ChainError>
where
    H: Copy + PartialEq,
{
    let leaf_start = tree.len() / 2;
    let mut index = tree[leaf_start..]
        .iter()
        .position(|h| *h == leaf)
        .map(|p| leaf_start + p)
        .ok_or(ChainError::MerkleLeafNotFound)?;

    let mut proof = Vec::new();
    while index > 0 {
        if index % 2 == 1 {
            proof.push(ProofStep {
                hash: tree[index + 1],
                side: Side::Right,
            });
        } else {
            proof.push(ProofStep {
                hash: tree[index - 1],
                side: Side::Left,
            });
        }
        index = (index - 1) / 2;
    }
    Ok(proof)
}

/// Verify an inclusion proof against a root by folding the target hash with
/// each sibling, respecting sides. The pair hasher's zero-pass-through rule
/// applies here exactly as during construction.
pub fn merkle_verify<H, PF>(leaf: H, proof: &[ProofStep<H>], root: H, pair_hash: PF) -> bool
where
    H: Copy + PartialEq,
    PF: Fn(&H, &H) -> H,
{
    let mut acc = leaf;
    for step in proof {
        acc = match step.side {
            Side::Right => pair_hash(&acc, &step.hash),
            Side::Left => pair_hash(&step.hash, &acc),
        };
    }
    acc == root
}

/// Pair hasher for transaction trees: hash of the concatenated hex strings,
/// with the zero right child passed through.
pub fn tx_pair_hash(l: &Hash, r: &Hash) -> Hash {
    if r.is_zero() {
        return *l;
    }
    hash_value(&format!("{l}{r}"))
}

/// Build the Merkle tree over a block's transactions.
pub fn tx_merkle_tree(txs: &[SigTx]) -> Result<Vec<Hash>, ChainError> {
    merkle_build(txs, |tx| tx.hash(), tx_pair_hash)
}

/// The Merkle root over a block's transactions.
pub fn tx_merkle_root(txs: &[SigTx]) -> Result<Hash, ChainError> {
    Ok(merkle_root(&tx_merkle_tree(txs)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    // A cheap synthetic leaf hasher for structural tests.
    fn leaf(n: &u8) -> Hash {
        Hash::new([*n; 32])
    }

    fn pair(l: &Hash, r: &Hash) -> Hash {
        tx_pair_hash(l, r)
    }

    #[test]
    fn empty_input_rejected() {
        let items: [u8; 0] = [];
        assert!(matches!(
            merkle_build(&items, leaf, pair),
            Err(ChainError::EmptyMerkleTree)
        ));
    }

    #[test]
    fn single_leaf_tree_is_one_node() {
        let tree = merkle_build(&[7u8], leaf, pair).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(merkle_root(&tree), leaf(&7));
    }

    #[test]
    fn single_leaf_proof_is_empty_and_verifies() {
        let tree = merkle_build(&[7u8], leaf, pair).unwrap();
        let proof = merkle_prove(leaf(&7), &tree).unwrap();
        assert!(proof.is_empty());
        assert!(merkle_verify(leaf(&7), &proof, merkle_root(&tree), pair));
    }

    #[test]
    fn odd_count_uses_passthrough() {
        // Three leaves: the fourth slot stays zero, so the second pair
        // reduces to its left child.
        let tree = merkle_build(&[1u8, 2, 3], leaf, pair).unwrap();
        assert_eq!(tree.len(), 7);
        assert_eq!(tree[2], leaf(&3));
        assert_eq!(tree[0], pair(&tree[1], &tree[2]));
    }

    #[test]
    fn proof_roundtrip_all_leaves() {
        for n in 1u8..=9 {
            let items: Vec<u8> = (1..=n).collect();
            let tree = merkle_build(&items, leaf, pair).unwrap();
            let root = merkle_root(&tree);
            for item in &items {
                let proof = merkle_prove(leaf(item), &tree).unwrap();
                assert!(
                    merkle_verify(leaf(item), &proof, root, pair),
                    "n={n} item={item}"
                );
            }
        }
    }

    #[test]
    fn proof_length_is_log2() {
        let items: Vec<u8> = (1..=5).collect();
        let tree = merkle_build(&items, leaf, pair).unwrap();
        let proof = merkle_prove(leaf(&1), &tree).unwrap();
        assert_eq!(proof.len(), 3); // ceil(log2(5))
    }

    #[test]
    fn absent_leaf_has_no_proof() {
        let tree = merkle_build(&[1u8, 2, 3], leaf, pair).unwrap();
        assert!(matches!(
            merkle_prove(leaf(&9), &tree),
            Err(ChainError::MerkleLeafNotFound)
        ));
    }

    #[test]
    fn foreign_leaf_fails_verification() {
        let items: Vec<u8> = (1..=5).collect();
        let tree = merkle_build(&items, leaf, pair).unwrap();
        let root = merkle_root(&tree);
        let proof = merkle_prove(leaf(&2), &tree).unwrap();
        assert!(!merkle_verify(leaf(&9), &proof, root, pair));
    }

    #[test]
    fn wrong_root_fails_verification() {
        let tree = merkle_build(&[1u8, 2, 3, 4], leaf, pair).unwrap();
        let proof = merkle_prove(leaf(&2), &tree).unwrap();
        assert!(!merkle_verify(leaf(&2), &proof, leaf(&0xEE), pair));
    }

    #[test]
    fn pair_passthrough_rule() {
        let l = leaf(&5);
        assert_eq!(tx_pair_hash(&l, &Hash::ZERO), l);
        assert_ne!(tx_pair_hash(&l, &l), l);
    }
}
