//! Migration of an Ethereum Merkle-Patricia state trie into a
//! verkle-layout tree.
//!
//! The engine is a stateful [`visitor::TreeVisitor`] driven over a full
//! depth-first walk of the source state:
//! - [`account`] decodes account leaf payloads.
//! - [`preimage`] recovers the original address or storage slot from the
//!   hashed trie path.
//! - [`migrate::Migrator`] carries the cross-leaf context that attributes
//!   each storage leaf to the account whose sub-trie it was visited in,
//!   and writes accounts, code, and storage cells into a
//!   [`vkt_trie::tree::VktTree`].
//! - [`batch::CommitBatcher`] forces a destination flush every N migrated
//!   leaves so the pending write set stays bounded.
//! - [`walker`] is a traversal driver over [`mpt_trie`] tries that
//!   delivers callbacks in the account-before-its-storage order the
//!   migrator requires.
//!
//! Per-leaf failures (undecodable payloads, unresolved preimages,
//! unattributable storage) skip the leaf and are tallied in the run's
//! [`migrate::MigrationReport`]; only destination-write failures abort a
//! run.

pub mod account;
pub mod batch;
pub mod migrate;
pub mod preimage;
pub mod reader;
pub mod visitor;
pub mod walker;
