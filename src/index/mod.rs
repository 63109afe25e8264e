//! The B+ tree index: generic fixed-width keys, leaf/internal pages riding
//! on the buffer pool, and the index-roots map that tells a tree where its
//! root lives across reopens.

pub mod b_plus_tree;
pub mod b_plus_tree_page;
pub mod generic_key;
pub mod index_roots_page;
pub mod internal_page;
pub mod iterator;
pub mod leaf_page;
pub mod row_id;

pub use b_plus_tree::BPlusTree;
pub use generic_key::{GenericKey, Key16, Key32, Key4, Key64, Key8};
pub use iterator::IndexIterator;
pub use row_id::RowId;
