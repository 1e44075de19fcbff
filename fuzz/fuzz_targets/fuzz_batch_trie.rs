#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stmtrie::index::types::Position;
use stmtrie::index::{BatchTrie, Pos, TrieKind};

#[derive(Arbitrary, Debug)]
struct Input {
    plain: bool,
    sequences: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let kind = if input.plain {
        TrieKind::Plain
    } else {
        TrieKind::Compressed
    };
    let mut batch = BatchTrie::new(kind);

    // Small alphabet so sequences share prefixes
    let sequences: Vec<Vec<String>> = input
        .sequences
        .iter()
        .take(64)
        .map(|seq| seq.iter().take(32).map(|b| format!("t{}", b % 8)).collect())
        .collect();

    for (i, seq) in sequences.iter().enumerate() {
        let pos = Pos::new("fuzz", "F.java", Position::new(i as i32, 1), Position::new(i as i32, 2));
        batch.add(seq, Some(pos)).unwrap();
    }
    batch.check_siblings().unwrap();

    for (i, seq) in sequences.iter().enumerate() {
        if seq.is_empty() {
            continue;
        }
        let hits = batch.find(seq);
        assert!(hits.iter().any(|p| p.start.line == i as i32));
    }
});
