//! Source tokenization for indexing and queries
//!
//! - [`lexer`] - tokens with 1-based line/column positions
//! - [`statements`] - statement extraction, identifier renaming, query parsing
//!
//! Corpus files and query snippets go through the same normalization, so a
//! query's label sequences can be matched directly against the index.

pub mod lexer;
pub mod statements;

pub use lexer::{Token, TokenKind, lex};
pub use statements::{
    FileStatements, Statement, StmtKind, SyntaxOptions, extract, parse_query, parse_source,
};
