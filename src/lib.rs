//! # stmtrie - statement-level clone index
//!
//! stmtrie tokenizes source files into normalized statements and stores
//! every statement as a path in a persistent compressed trie. Looking up a
//! statement (or a run of consecutive statements) returns every place in the
//! corpus where it occurs.
//!
//! ## Architecture
//!
//! - [`syntax`] - lexer and statement extraction with identifier renaming
//! - [`index`] - batch trie, persistent trie, storage files and the build driver
//! - [`output`] - result formatting (plain, colored or JSON)
//! - [`utils`] - config loading, app data paths, encoding helpers, progress
//! - [`error`] - the engine error type
//!
//! ## Quick Start
//!
//! ```ignore
//! use stmtrie::index::{IndexConfig, PersistentTrie, build_index, BuildOptions};
//! use stmtrie::index::storage::OpenMode;
//! use stmtrie::syntax::{parse_query, SyntaxOptions};
//!
//! let config = IndexConfig {
//!     source_dir: "corpus".into(),
//!     data_path: Some("corpus-index".into()),
//!     ..Default::default()
//! };
//! let summary = build_index(&config, &BuildOptions::default())?;
//!
//! let layout = config.layout(&summary.data_dir);
//! let trie = PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadOnly)?;
//! let query = parse_query("return Math.min(x, y);", SyntaxOptions::default())?;
//! for pos in trie.find(&query[0])? {
//!     println!("{}", pos);
//! }
//! ```
//!
//! ## Storage
//!
//! Batches of files are first collected into an in-memory trie and then
//! merged into the persistent one. Nodes, edge blocks and position blocks
//! live in memory-mapped files; labels are interned into append-only
//! dictionaries and every edge label is a range into a shared
//! linearization buffer.

pub mod error;
pub mod index;
pub mod output;
pub mod syntax;
pub mod utils;
