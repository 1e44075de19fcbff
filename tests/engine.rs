//! End-to-end tests of the build driver and the persistent trie.
//!
//! The fixture corpus is written from string literals into temp directories;
//! every query goes through the same tokenizer the indexer uses.

use proptest::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use stmtrie::index::storage::OpenMode;
use stmtrie::index::types::Position;
use stmtrie::index::{
    BatchTrie, BuildOptions, FileLayout, IndexConfig, PageSizes, PersistentTrie, Pos, TrieKind,
    build_index,
};
use stmtrie::syntax::{SyntaxOptions, parse_query, parse_source};
use tempfile::TempDir;

const TEST1: &str = r#"package test;

public class Test1 {
    public int smaller(int x, int y) {
        return Math.min(x, y);
    }

    public void fill(List p) {
        p.add(3);
        p.add(4);
    }
}
"#;

const TEST2: &str = r#"package test;

public class Test2 {
    public void tryIt() {
        try {
            run();
        } catch (Exception e) {
            log(e);
        }
    }

    void run(List p) {
        p.add(5);
    }

    void log(Exception e) {
    }
}
"#;

const TEST3: &str = r#"package test;

public class Test3 {
    private final Random rand = new Random();

    public void nextInt() {
        int r = 1 + rand.nextInt(100);
        if (r > 50) {
            System.out.println(r);
        }
    }
}
"#;

fn write_corpus(root: &Path, files: &[(&str, &str)]) {
    for (rel, content) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn corpus() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_corpus(
        dir.path(),
        &[
            ("src/test/Test1.java", TEST1),
            ("src/test/Test2.java", TEST2),
            ("src/test/Test3.java", TEST3),
        ],
    );
    dir
}

fn config(source: &Path, data: PathBuf) -> IndexConfig {
    IndexConfig {
        source_dir: source.to_path_buf(),
        data_path: Some(data),
        project: "demo".to_string(),
        ..Default::default()
    }
}

fn build(config: &IndexConfig) -> PersistentTrie {
    let summary = build_index(config, &BuildOptions::default()).unwrap();
    let layout = config.layout(&summary.data_dir);
    PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadOnly).unwrap()
}

fn find(trie: &PersistentTrie, code: &str) -> Vec<Pos> {
    let query = parse_query(code, SyntaxOptions::default()).unwrap();
    assert_eq!(query.len(), 1, "{}", code);
    trie.find(&query[0]).unwrap()
}

/// Label sequences of every statement in the corpus, with their positions
fn corpus_statements(root: &Path, project: &str) -> Vec<(Vec<String>, Pos)> {
    let mut out = Vec::new();
    for (rel, content) in [
        ("src/test/Test1.java", TEST1),
        ("src/test/Test2.java", TEST2),
        ("src/test/Test3.java", TEST3),
    ] {
        assert!(root.join(rel).is_file());
        let file = parse_source(content, SyntaxOptions::default()).unwrap();
        for statement in file.statements {
            let pos = Pos::new(project, rel, statement.start, statement.end);
            out.push((statement.labels, pos));
        }
    }
    out
}

fn hit_set(trie: &PersistentTrie, labels: &[String]) -> HashSet<Pos> {
    trie.find(labels).unwrap().into_iter().collect()
}

#[test]
fn test_single_statement_queries() {
    let src = corpus();
    let data = TempDir::new().unwrap();
    let trie = build(&config(src.path(), data.path().join("index")));

    let hits = find(&trie, "int m = 1 + gen.nextInt(100);");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file, "src/test/Test3.java");
    assert_eq!(hits[0].project, "demo");
    assert_eq!(hits[0].start, Position::new(7, 9));
    assert_eq!(hits[0].method_start, Position::new(6, 5));

    let hits = find(&trie, "return Math.min(x, y);");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].file, "src/test/Test1.java");
    assert_eq!(hits[0].start, Position::new(5, 9));

    assert_eq!(find(&trie, "p.add(3);").len(), 1);
    assert_eq!(find(&trie, "p.add(5);").len(), 1);
    assert_eq!(find(&trie, "p.add(5);")[0].file, "src/test/Test2.java");

    let hits = find(&trie, "try { run(); } catch (Exception e) { log(e); }");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].start, Position::new(5, 9));
    assert_eq!(hits[0].end, Position::new(9, 9));

    assert!(find(&trie, "p.add(6);").is_empty());
    assert!(find(&trie, "unknownCall();").is_empty());
}

#[test]
fn test_sequence_query() {
    let src = corpus();
    let data = TempDir::new().unwrap();
    let trie = build(&config(src.path(), data.path().join("index")));

    let query = parse_query("p.add(3); p.add(4);", SyntaxOptions::default()).unwrap();
    let chains = trie.find_sequence(&query).unwrap();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].len(), 2);
    assert_eq!(chains[0][0].start.line, 9);
    assert_eq!(chains[0][1].start.line, 10);

    // Same statements, wrong order
    let query = parse_query("p.add(4); p.add(3);", SyntaxOptions::default()).unwrap();
    assert!(trie.find_sequence(&query).unwrap().is_empty());

    let next = trie.next_statement(&chains[0][0]).unwrap();
    assert_eq!(next.as_ref(), Some(&chains[0][1]));
    assert_eq!(trie.next_statement(&chains[0][1]).unwrap(), None);
}

#[test]
fn test_every_statement_is_found_at_its_position() {
    let src = corpus();
    let data = TempDir::new().unwrap();
    let trie = build(&config(src.path(), data.path().join("index")));

    let statements = corpus_statements(src.path(), "demo");
    assert!(statements.len() >= 10);
    for (labels, pos) in &statements {
        let hits = hit_set(&trie, labels);
        assert!(hits.contains(pos), "{} not found", pos);
    }

    let meta = trie.meta();
    assert_eq!(meta.file_count, 3);
    assert_eq!(meta.project_count, 1);
    assert_eq!(meta.position_count, statements.len() as u64);
}

#[test]
fn test_plain_and_compressed_agree() {
    let src = corpus();
    let data = TempDir::new().unwrap();

    let compressed = build(&config(src.path(), data.path().join("compressed")));
    let plain = build(&IndexConfig {
        compressed: false,
        ..config(src.path(), data.path().join("plain"))
    });
    assert_eq!(plain.kind(), TrieKind::Plain);

    for (labels, _) in corpus_statements(src.path(), "demo") {
        assert_eq!(hit_set(&compressed, &labels), hit_set(&plain, &labels));
    }
    // One edge per label in the plain trie
    assert!(plain.counters().edges > compressed.counters().edges);
}

#[test]
fn test_batch_size_does_not_change_results() {
    let src = corpus();
    let data = TempDir::new().unwrap();

    let one = build(&IndexConfig {
        batch_file_size: 1,
        ..config(src.path(), data.path().join("one"))
    });
    let all = build(&config(src.path(), data.path().join("all")));
    assert_eq!(one.meta().merges, 3);
    assert_eq!(all.meta().merges, 1);

    for (labels, _) in corpus_statements(src.path(), "demo") {
        assert_eq!(hit_set(&one, &labels), hit_set(&all, &labels));
    }
}

#[test]
fn test_second_run_extends_and_force_rebuilds() {
    let first = corpus();
    let second = TempDir::new().unwrap();
    write_corpus(second.path(), &[("Other.java", "class Other { void f(List p) { p.add(3); } }")]);
    let data = TempDir::new().unwrap();
    let dir = data.path().join("index");

    drop(build(&config(first.path(), dir.clone())));
    let trie = build(&IndexConfig {
        project: "other".to_string(),
        ..config(second.path(), dir.clone())
    });
    let projects: HashSet<String> = find(&trie, "p.add(3);").into_iter().map(|p| p.project).collect();
    assert_eq!(projects, HashSet::from(["demo".to_string(), "other".to_string()]));
    drop(trie);

    let config = IndexConfig {
        project: "other".to_string(),
        ..config(second.path(), dir)
    };
    build_index(&config, &BuildOptions { force: true, show_progress: false }).unwrap();
    let layout = config.layout(config.data_path.as_deref().unwrap());
    let trie = PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadOnly).unwrap();
    let hits = find(&trie, "p.add(3);");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].project, "other");
}

#[test]
fn test_kind_mismatch_with_existing_index_is_rejected() {
    let src = corpus();
    let data = TempDir::new().unwrap();
    let dir = data.path().join("index");

    build_index(&config(src.path(), dir.clone()), &BuildOptions::default()).unwrap();
    let plain = IndexConfig {
        compressed: false,
        ..config(src.path(), dir)
    };
    assert!(build_index(&plain, &BuildOptions::default()).is_err());
}

fn small_pages() -> PageSizes {
    PageSizes {
        nodes: 128,
        edges: 512,
        positions: 1024,
    }
}

fn seq_pos(i: usize) -> Pos {
    Pos::new("p", "F.java", Position::new(i as i32, 1), Position::new(i as i32, 2))
}

/// Merge `sequences` in batches of `batch` into a fresh trie, then reopen it
fn merged(dir: &Path, kind: TrieKind, sequences: &[Vec<String>], batch: usize) -> PersistentTrie {
    let layout = FileLayout::in_dir(dir);
    let mut trie = PersistentTrie::initialize(&layout, small_pages(), kind).unwrap();
    for (chunk_index, chunk) in sequences.chunks(batch).enumerate() {
        let mut batch_trie = BatchTrie::new(kind);
        for (offset, seq) in chunk.iter().enumerate() {
            batch_trie.add(seq, Some(seq_pos(chunk_index * batch + offset))).unwrap();
        }
        trie.add_trie(&batch_trie).unwrap();
    }
    trie.close().unwrap();
    PersistentTrie::open(&layout, small_pages(), OpenMode::ReadOnly).unwrap()
}

fn sequences() -> impl Strategy<Value = Vec<Vec<String>>> {
    let label = prop::sample::select(vec!["a", "b", "c", "d"]).prop_map(str::to_string);
    prop::collection::vec(prop::collection::vec(label, 1..6), 1..24)
}

/// Positions of the sequences exactly equal to `query`
fn expected_hits(sequences: &[Vec<String>], query: &[String]) -> HashSet<Pos> {
    sequences
        .iter()
        .enumerate()
        .filter(|(_, other)| other.as_slice() == query)
        .map(|(j, _)| seq_pos(j))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_find_returns_exactly_the_equal_sequences(
        sequences in sequences(),
        batch in 1usize..8,
    ) {
        let dir = TempDir::new().unwrap();
        let compressed = merged(&dir.path().join("c"), TrieKind::Compressed, &sequences, batch);
        let plain = merged(&dir.path().join("p"), TrieKind::Plain, &sequences, sequences.len());

        prop_assert!(compressed.check_siblings().is_ok());
        prop_assert!(plain.check_siblings().is_ok());
        prop_assert_eq!(compressed.counters().positions, sequences.len() as u64);

        // Every prefix, inserted or not, matches only the equal sequences
        for seq in &sequences {
            for len in 1..=seq.len() {
                let query = &seq[..len];
                let expected = expected_hits(&sequences, query);
                let found = compressed.find(query).unwrap();
                prop_assert_eq!(found.len(), expected.len());
                prop_assert_eq!(found.into_iter().collect::<HashSet<_>>(), expected.clone());
                prop_assert_eq!(hit_set(&plain, query), expected);
            }
        }
    }
}
