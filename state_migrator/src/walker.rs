use std::collections::BTreeMap;

use ethereum_types::H256;
use mpt_trie::nibbles::Nibbles;
use mpt_trie::partial_trie::{HashedPartialTrie, Node, PartialTrie as _};

use crate::visitor::{NodeContext, TreeVisitor};

/// A source world to walk: the account trie plus each account's storage
/// trie, keyed by hashed address (i.e. by the account leaf's full path
/// bytes).
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    pub state: HashedPartialTrie,
    pub storage: BTreeMap<H256, HashedPartialTrie>,
}

/// Walks `source` depth-first and delivers every node to `visitor`.
///
/// Each account's storage sub-trie is descended into immediately after the
/// account's own leaf, before any other account leaf, which is the
/// ordering [`TreeVisitor`] implementations are entitled to rely on for
/// storage attribution. Hashed-out nodes are reported via
/// [`TreeVisitor::visit_missing_node`] and their subtrees skipped.
pub fn walk<V: TreeVisitor>(source: &SourceState, visitor: &mut V) -> anyhow::Result<()> {
    let root_hash = source.state.hash();
    visitor.visit_tree(root_hash)?;
    walk_node(source, &source.state, Nibbles::default(), false, visitor)?;
    visitor.visit_tree_end(root_hash)
}

fn walk_node<V: TreeVisitor>(
    source: &SourceState,
    node: &Node<HashedPartialTrie>,
    path: Nibbles,
    is_storage: bool,
    visitor: &mut V,
) -> anyhow::Result<()> {
    let ctx = NodeContext { path, is_storage };
    match node {
        Node::Empty => Ok(()),
        Node::Hash(h) => visitor.visit_missing_node(&ctx, *h),
        Node::Branch { children, value } => {
            visitor.visit_branch(&ctx)?;
            for (i, child) in children.iter().enumerate() {
                walk_node(
                    source,
                    child,
                    path.merge_nibble(i as u8),
                    is_storage,
                    visitor,
                )?;
            }
            // State tries key on fixed-width hashes, so no node terminates
            // inside a branch.
            debug_assert!(value.is_empty(), "unexpected branch value at {path:x}");
            Ok(())
        }
        Node::Extension { nibbles, child } => {
            visitor.visit_extension(&ctx, nibbles)?;
            walk_node(
                source,
                child,
                path.merge_nibbles(nibbles),
                is_storage,
                visitor,
            )
        }
        Node::Leaf { nibbles, value } => {
            visitor.visit_leaf(&ctx, nibbles, value)?;
            if !is_storage {
                if let Some(trie) = leaf_key(path, nibbles).and_then(|h| source.storage.get(&h)) {
                    walk_node(source, trie, Nibbles::default(), true, visitor)?;
                }
            }
            Ok(())
        }
    }
}

/// The 32-byte full key of a leaf, when the path is exactly key-sized.
fn leaf_key(path: Nibbles, key: &Nibbles) -> Option<H256> {
    let full = path.merge_nibbles(key);
    (full.count == 64).then(|| H256::from_slice(&full.bytes_be()))
}
