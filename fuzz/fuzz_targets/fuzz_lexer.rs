#![no_main]

use libfuzzer_sys::fuzz_target;
use stmtrie::syntax::{SyntaxOptions, lex, parse_source};

fuzz_target!(|data: &str| {
    // Errors are fine; panics are not
    if let Ok(tokens) = lex(data) {
        for token in &tokens {
            assert!(token.start <= token.end);
        }
    }
    let _ = parse_source(data, SyntaxOptions::default());
});
