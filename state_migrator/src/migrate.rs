use anyhow::Context as _;
use ethereum_types::{Address, H256, U256};
use log::{debug, info, warn};
use mpt_trie::nibbles::Nibbles;
use vkt_trie::db::Db;
use vkt_trie::tree::VktTree;

use crate::account::Account;
use crate::batch::CommitBatcher;
use crate::preimage::{PreimageResolver, PreimageStore};
use crate::reader::StateReader;
use crate::visitor::{NodeContext, TreeVisitor};

/// Per-reason tallies of source leaves that were seen but not migrated.
/// Skips are diagnostics; they never fail the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkippedLeaves {
    /// Account leaves whose payload did not decode.
    pub undecodable_accounts: u64,
    /// Account leaves whose address preimage could not be recovered.
    pub unresolved_addresses: u64,
    /// Storage leaves whose slot preimage could not be recovered.
    pub unresolved_slots: u64,
    /// Storage leaves visited with no attributable owning account.
    pub orphaned_storage: u64,
}

impl SkippedLeaves {
    pub fn total(&self) -> u64 {
        self.undecodable_accounts
            + self.unresolved_addresses
            + self.unresolved_slots
            + self.orphaned_storage
    }
}

/// End-of-run summary: what was migrated, what was skipped and why, and
/// how many mid-run flushes the batcher forced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub accounts: u64,
    pub code_blobs: u64,
    pub storage_slots: u64,
    pub skipped: SkippedLeaves,
    pub missing_nodes: u64,
    pub flushes: u64,
    /// Set once [`Migrator::finish`] has recorded the checkpoint.
    pub migrated_block: Option<u64>,
}

/// The destination tree and run summary handed back by
/// [`Migrator::finish`].
#[derive(Debug)]
pub struct MigrationOutcome<D: Db> {
    pub tree: VktTree<D>,
    pub report: MigrationReport,
}

/// Migrates a Merkle-Patricia state trie into a verkle-layout tree.
///
/// One instance is one migration run: it owns the destination tree and the
/// `last seen account` context that attributes storage leaves, so it is
/// driven by exactly one traversal at a time. The traversal driver must
/// visit each account's storage sub-trie immediately after that account's
/// leaf ([`crate::walker::walk`] does).
#[derive(Debug)]
pub struct Migrator<D: Db, R, S> {
    tree: VktTree<D>,
    reader: R,
    preimages: PreimageResolver<S>,
    batcher: CommitBatcher,
    last_address: Option<Address>,
    last_account: Option<Account>,
    report: MigrationReport,
}

impl<D: Db, R: StateReader, S: PreimageStore> Migrator<D, R, S> {
    pub fn new(tree: VktTree<D>, reader: R, preimages: PreimageResolver<S>) -> Self {
        Self {
            tree,
            reader,
            preimages,
            batcher: CommitBatcher::default(),
            last_address: None,
            last_account: None,
            report: MigrationReport::default(),
        }
    }

    /// Overrides the number of migrated leaves between mid-run flushes.
    pub fn with_commit_threshold(mut self, threshold: usize) -> Self {
        self.batcher = CommitBatcher::new(threshold);
        self
    }

    /// The running tallies for this run so far.
    pub fn report(&self) -> &MigrationReport {
        &self.report
    }

    /// Completes the run: flushes whatever is still buffered and durably
    /// records `block_number` as the migrated height. Consuming `self`
    /// guarantees the checkpoint is the run's last commit and cannot be
    /// issued twice.
    pub fn finish(mut self, block_number: u64) -> anyhow::Result<MigrationOutcome<D>> {
        if self.batcher.dirty() {
            self.tree
                .flush()
                .context("final flush of the destination tree failed")?;
        }
        self.tree
            .checkpoint(block_number)
            .context("checkpoint commit failed")?;
        self.report.migrated_block = Some(block_number);
        info!(
            "migration complete at block {}: {} accounts, {} code blobs, {} storage slots, {} leaves skipped, {} missing nodes",
            block_number,
            self.report.accounts,
            self.report.code_blobs,
            self.report.storage_slots,
            self.report.skipped.total(),
            self.report.missing_nodes,
        );
        Ok(MigrationOutcome {
            tree: self.tree,
            report: self.report,
        })
    }

    /// Counts one migrated leaf and performs the mid-run flush when the
    /// batcher says one is due. Flush failures are fatal.
    fn migrated_one(&mut self) -> anyhow::Result<()> {
        if self.batcher.record_migrated() {
            self.tree
                .flush()
                .context("mid-run flush of the destination tree failed")?;
            self.report.flushes += 1;
        }
        Ok(())
    }

    fn visit_account_leaf(&mut self, full_path: Nibbles, value: &[u8]) -> anyhow::Result<()> {
        let Some(mut account) = Account::decode(value) else {
            warn!("skipping undecodable account leaf at path {full_path:x}");
            self.report.skipped.undecodable_accounts += 1;
            return Ok(());
        };

        let path_bytes = full_path.bytes_be();
        let address = match self.preimages.resolve(&path_bytes) {
            Some(bytes) if bytes.len() == Address::len_bytes() => Address::from_slice(&bytes),
            _ => {
                warn!("skipping account at path {full_path:x}: address preimage not recoverable");
                self.report.skipped.unresolved_addresses += 1;
                return Ok(());
            }
        };

        if account.has_code() {
            match self.reader.code(account.code_hash) {
                Some(code) => {
                    account.code_size = U256::from(code.len());
                    self.tree.set_code(address, &code);
                    self.report.code_blobs += 1;
                    self.migrated_one()?;
                }
                None => debug!(
                    "code {:x} for account {address:x} not found in the state reader",
                    account.code_hash
                ),
            }
        }

        self.tree.set_account(address, &account.into());
        self.report.accounts += 1;
        self.migrated_one()?;

        self.last_address = Some(address);
        self.last_account = Some(account);
        Ok(())
    }

    fn visit_storage_leaf(&mut self, full_path: Nibbles, value: &[u8]) -> anyhow::Result<()> {
        let (Some(address), Some(_)) = (self.last_address, self.last_account) else {
            warn!("skipping storage leaf at path {full_path:x}: no owning account in context");
            self.report.skipped.orphaned_storage += 1;
            return Ok(());
        };

        let path_bytes = full_path.bytes_be();
        let slot = match self.preimages.resolve(&path_bytes) {
            Some(bytes) if bytes.len() <= 32 => U256::from_big_endian(&bytes),
            _ => {
                warn!(
                    "skipping storage leaf at path {full_path:x} for {address:x}: \
                     slot preimage not recoverable"
                );
                self.report.skipped.unresolved_slots += 1;
                return Ok(());
            }
        };

        self.tree.set_storage(address, slot, value.to_vec());
        self.report.storage_slots += 1;
        self.migrated_one()
    }
}

impl<D: Db, R: StateReader, S: PreimageStore> TreeVisitor for Migrator<D, R, S> {
    fn visit_tree(&mut self, root_hash: H256) -> anyhow::Result<()> {
        info!("starting migration from merkle root {root_hash:x}");
        self.last_address = None;
        self.last_account = None;
        Ok(())
    }

    fn visit_missing_node(&mut self, ctx: &NodeContext, node_hash: H256) -> anyhow::Result<()> {
        warn!(
            "missing node {node_hash:x} at path {:x}; its subtree will not be migrated",
            ctx.path
        );
        self.report.missing_nodes += 1;
        Ok(())
    }

    fn visit_leaf(
        &mut self,
        ctx: &NodeContext,
        key: &Nibbles,
        value: &[u8],
    ) -> anyhow::Result<()> {
        let full_path = ctx.full_key(key);
        match ctx.is_storage {
            false => self.visit_account_leaf(full_path, value),
            true => self.visit_storage_leaf(full_path, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use keccak_hash::keccak;
    use vkt_trie::db::MemoryDb;
    use vkt_trie::keys::{key_basic_data, key_code_chunk, key_storage};
    use vkt_trie::leaf::pack_basic_data;

    use super::*;
    use crate::preimage::MemoryPreimageDb;
    use crate::reader::NoCode;

    fn addr() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn account_value(balance: u64, code_hash: Option<H256>) -> Vec<u8> {
        rlp::encode(&Account {
            balance: U256::from(balance),
            code_hash: code_hash.unwrap_or(keccak_hash::KECCAK_EMPTY),
            ..Default::default()
        })
        .to_vec()
    }

    fn preimages_for(addr: Address, slots: &[u64]) -> PreimageResolver<MemoryPreimageDb> {
        let mut db = MemoryPreimageDb::default();
        db.record_address(addr);
        for &slot in slots {
            db.record_slot(U256::from(slot));
        }
        PreimageResolver::new(db)
    }

    fn account_path(addr: Address) -> Nibbles {
        Nibbles::from_h256_be(keccak(addr))
    }

    fn slot_path(slot: u64) -> Nibbles {
        let mut bytes = [0u8; 32];
        U256::from(slot).to_big_endian(&mut bytes);
        Nibbles::from_h256_be(keccak(bytes))
    }

    fn ctx(is_storage: bool) -> NodeContext {
        NodeContext {
            path: Nibbles::default(),
            is_storage,
        }
    }

    fn new_migrator(
        preimages: PreimageResolver<MemoryPreimageDb>,
    ) -> Migrator<MemoryDb, NoCode, MemoryPreimageDb> {
        Migrator::new(VktTree::default(), NoCode, preimages)
    }

    #[test]
    fn one_account_with_two_storage_slots() {
        let mut migrator = new_migrator(preimages_for(addr(), &[1, 2]));
        migrator.visit_tree(H256::repeat_byte(0x01)).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(100, None))
            .unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(1), &[0x01])
            .unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(2), &[0x02])
            .unwrap();

        let MigrationOutcome { tree, report } = migrator.finish(42).unwrap();
        assert_eq!(report.accounts, 1);
        assert_eq!(report.storage_slots, 2);
        assert_eq!(report.flushes, 0);
        assert_eq!(report.skipped, SkippedLeaves::default());
        assert_eq!(report.migrated_block, Some(42));
        assert_eq!(tree.db.committed_block, Some(42));

        let expected = pack_basic_data(
            &Account {
                balance: U256::from(100),
                ..Default::default()
            }
            .into(),
        );
        assert_eq!(tree.get(&key_basic_data(addr())), Some(expected.as_slice()));
        assert_eq!(
            tree.get(&key_storage(addr(), U256::from(1))),
            Some([0x01].as_slice())
        );
        assert_eq!(
            tree.get(&key_storage(addr(), U256::from(2))),
            Some([0x02].as_slice())
        );
    }

    #[test]
    fn code_is_fetched_and_its_size_recomputed() {
        let code = vec![0x60, 0x01, 0x60, 0x02, 0x55];
        let code_hash = keccak(&code);
        let mut reader = HashMap::new();
        reader.insert(code_hash, code.clone());

        let mut migrator = Migrator::new(
            VktTree::<MemoryDb>::default(),
            reader,
            preimages_for(addr(), &[]),
        );
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(
                &ctx(false),
                &account_path(addr()),
                &account_value(7, Some(code_hash)),
            )
            .unwrap();

        let MigrationOutcome { tree, report } = migrator.finish(1).unwrap();
        assert_eq!(report.accounts, 1);
        assert_eq!(report.code_blobs, 1);
        assert!(tree.get(&key_code_chunk(addr(), U256::zero())).is_some());

        // code_size in the basic-data leaf reflects the fetched length.
        let packed = tree.get(&key_basic_data(addr())).unwrap();
        assert_eq!(&packed[5..8], &[0, 0, code.len() as u8]);
    }

    #[test]
    fn missing_code_still_migrates_the_account() {
        let mut migrator = new_migrator(preimages_for(addr(), &[]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(
                &ctx(false),
                &account_path(addr()),
                &account_value(7, Some(H256::repeat_byte(0x99))),
            )
            .unwrap();

        let report = *migrator.report();
        assert_eq!(report.accounts, 1);
        assert_eq!(report.code_blobs, 0);
    }

    #[test]
    fn storage_without_an_owner_is_skipped() {
        let mut migrator = new_migrator(preimages_for(addr(), &[1]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(1), &[0xff])
            .unwrap();

        let MigrationOutcome { tree, report } = migrator.finish(1).unwrap();
        assert_eq!(report.storage_slots, 0);
        assert_eq!(report.skipped.orphaned_storage, 1);
        // It must not land in the destination under any key.
        assert!(tree.db.db.is_empty());
    }

    #[test]
    fn tree_entry_resets_the_owner_context() {
        let mut migrator = new_migrator(preimages_for(addr(), &[1]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(1, None))
            .unwrap();

        // A fresh top-level traversal begins; the previous account no
        // longer owns anything.
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(1), &[0x01])
            .unwrap();
        assert_eq!(migrator.report().skipped.orphaned_storage, 1);
    }

    #[test]
    fn undecodable_accounts_orphan_their_storage() {
        let mut migrator = new_migrator(preimages_for(addr(), &[1]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &[0xba, 0xad])
            .unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(1), &[0x01])
            .unwrap();

        let report = *migrator.report();
        assert_eq!(report.skipped.undecodable_accounts, 1);
        assert_eq!(report.skipped.orphaned_storage, 1);
        assert_eq!(report.accounts, 0);
    }

    #[test]
    fn unresolved_address_skips_the_account() {
        let mut migrator = new_migrator(PreimageResolver::new(MemoryPreimageDb::default()));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(1, None))
            .unwrap();

        assert_eq!(migrator.report().skipped.unresolved_addresses, 1);
        assert_eq!(migrator.report().accounts, 0);
    }

    #[test]
    fn unresolved_slot_skips_only_that_leaf() {
        let mut migrator = new_migrator(preimages_for(addr(), &[2]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(1, None))
            .unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(1), &[0x01])
            .unwrap();
        migrator
            .visit_leaf(&ctx(true), &slot_path(2), &[0x02])
            .unwrap();

        let report = *migrator.report();
        assert_eq!(report.skipped.unresolved_slots, 1);
        assert_eq!(report.storage_slots, 1);
    }

    #[test]
    fn batcher_flushes_every_threshold_leaves() {
        let mut migrator = new_migrator(preimages_for(addr(), &[1, 2, 3, 4, 5]))
            .with_commit_threshold(2);
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(1, None))
            .unwrap();
        for slot in 1..=5 {
            let mut value = [0u8; 1];
            value[0] = slot as u8;
            migrator
                .visit_leaf(&ctx(true), &slot_path(slot), &value)
                .unwrap();
        }

        // 6 migrated leaves at threshold 2.
        assert_eq!(migrator.report().flushes, 3);
        let MigrationOutcome { tree, report } = migrator.finish(9).unwrap();
        assert_eq!(report.flushes, 3);
        assert_eq!(tree.pending_len(), 0);
        assert_eq!(tree.db.committed_block, Some(9));
    }

    /// A backing store that refuses all writes.
    #[derive(Debug, Default)]
    struct FailingDb;

    impl vkt_trie::db::Db for FailingDb {
        fn get_leaf(&self, _key: &vkt_trie::keys::TreeKey) -> Option<&[u8]> {
            None
        }
        fn set_leaf(
            &mut self,
            key: vkt_trie::keys::TreeKey,
            _value: Vec<u8>,
        ) -> vkt_trie::db::DbResult<()> {
            Err(vkt_trie::db::DbError::LeafWrite(
                hex::encode(key.0),
                "read-only backing store".into(),
            ))
        }
        fn checkpoint(&self) -> Option<u64> {
            None
        }
        fn set_checkpoint(&mut self, block_number: u64) -> vkt_trie::db::DbResult<()> {
            Err(vkt_trie::db::DbError::CheckpointWrite(
                block_number,
                "read-only backing store".into(),
            ))
        }
    }

    #[test]
    fn destination_write_failures_abort_the_run() {
        let mut migrator = Migrator::new(
            VktTree::<FailingDb>::default(),
            NoCode,
            preimages_for(addr(), &[]),
        )
        .with_commit_threshold(1);
        migrator.visit_tree(H256::zero()).unwrap();

        // The flush forced after the first migrated leaf hits the failing
        // store and must propagate, not be downgraded to a skip.
        let err = migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(1, None))
            .unwrap_err();
        assert!(err.to_string().contains("mid-run flush"));
    }

    #[test]
    fn a_failed_checkpoint_leaves_no_completion_marker() {
        let migrator = Migrator::new(
            VktTree::<FailingDb>::default(),
            NoCode,
            preimages_for(addr(), &[]),
        );
        assert!(migrator.finish(5).is_err());
    }

    #[test]
    fn missing_nodes_are_non_fatal() {
        let mut migrator = new_migrator(preimages_for(addr(), &[]));
        migrator.visit_tree(H256::zero()).unwrap();
        migrator
            .visit_missing_node(&ctx(false), H256::repeat_byte(0x0f))
            .unwrap();
        migrator
            .visit_leaf(&ctx(false), &account_path(addr()), &account_value(5, None))
            .unwrap();

        let MigrationOutcome { report, .. } = migrator.finish(3).unwrap();
        assert_eq!(report.missing_nodes, 1);
        assert_eq!(report.accounts, 1);
        assert_eq!(report.migrated_block, Some(3));
    }
}
