use ethereum_types::H256;
use mpt_trie::nibbles::Nibbles;

/// Context handed to every per-node callback.
#[derive(Debug, Clone, Default)]
pub struct NodeContext {
    /// Path from the root of the current trie to this node.
    pub path: Nibbles,
    /// Whether the walk is currently inside an account's storage sub-trie.
    pub is_storage: bool,
}

impl NodeContext {
    /// The full key of a node, i.e. the running path extended by the
    /// node's own key fragment.
    pub fn full_key(&self, key: &Nibbles) -> Nibbles {
        self.path.merge_nibbles(key)
    }
}

/// Callbacks delivered during a depth-first walk of a source trie.
///
/// The driver must deliver all of an account's storage leaves immediately
/// after that account's own leaf, with no other account's leaves in
/// between; visitors are allowed to rely on that ordering for storage
/// attribution. A visitor instance is single-run, single-threaded state
/// and must not be shared across concurrently walked subtrees.
pub trait TreeVisitor {
    /// Start of a walk over the trie rooted at `root_hash`.
    fn visit_tree(&mut self, root_hash: H256) -> anyhow::Result<()>;

    /// The node at `ctx.path` is not available (e.g. pruned). The walk
    /// continues around the gap.
    fn visit_missing_node(&mut self, ctx: &NodeContext, node_hash: H256) -> anyhow::Result<()>;

    fn visit_branch(&mut self, _ctx: &NodeContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn visit_extension(&mut self, _ctx: &NodeContext, _key: &Nibbles) -> anyhow::Result<()> {
        Ok(())
    }

    /// A leaf holding `value`, with `key` being the leaf's own fragment
    /// (not the full path).
    fn visit_leaf(&mut self, ctx: &NodeContext, key: &Nibbles, value: &[u8])
        -> anyhow::Result<()>;

    /// Contract code embedded in the walk. Unused by the migration, which
    /// fetches code by hash from the account leaf instead.
    fn visit_code(&mut self, _ctx: &NodeContext, _code_hash: H256) -> anyhow::Result<()> {
        Ok(())
    }

    /// End of the walk started by the matching [`Self::visit_tree`].
    fn visit_tree_end(&mut self, _root_hash: H256) -> anyhow::Result<()> {
        Ok(())
    }
}
