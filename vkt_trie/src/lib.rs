#![allow(clippy::too_long_first_doc_paragraph)]

pub mod db;
pub mod keys;
pub mod leaf;
pub mod tree;
