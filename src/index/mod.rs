pub mod adjacency;
pub mod batch;
pub mod build;
pub mod dict;
pub mod linear;
pub mod split;
pub mod stats;
pub mod storage;
pub mod trie;
pub mod types;

pub use batch::BatchTrie;
pub use build::{BuildOptions, BuildSummary, build_index};
pub use trie::PersistentTrie;
pub use types::*;
