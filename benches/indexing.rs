//! Indexing and lookup benchmarks over a generated corpus
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use std::fs;
use std::path::{Path, PathBuf};
use stmtrie::index::storage::OpenMode;
use stmtrie::index::{BatchTrie, BuildOptions, IndexConfig, PersistentTrie, TrieKind, build_index};
use stmtrie::syntax::{SyntaxOptions, parse_query, parse_source};
use tempfile::TempDir;

/// Java sources with many repeated statement shapes
fn create_corpus(files: usize) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for i in 0..files {
        let content = format!(
            r#"package bench;

public class Worker{i} {{
    private int count;

    public int step(int x) {{
        int y = x * {i} + 1;
        if (y > 100) {{
            y = Math.min(y, 100);
        }}
        for (int j = 0; j < y; j++) {{
            count += j;
        }}
        return y + count;
    }}

    public void reset() {{
        count = 0;
        System.out.println("reset {i}");
    }}
}}
"#
        );
        fs::write(dir.path().join(format!("Worker{}.java", i)), content)
            .expect("Failed to write file");
    }
    dir
}

fn config(source: &Path, data: PathBuf, compressed: bool) -> IndexConfig {
    IndexConfig {
        source_dir: source.to_path_buf(),
        data_path: Some(data),
        compressed,
        batch_file_size: 50,
        ..Default::default()
    }
}

fn bench_build(c: &mut Criterion) {
    let corpus = create_corpus(200);
    let mut group = c.benchmark_group("build");
    group.sample_size(10);

    for (name, compressed) in [("compressed", true), ("plain", false)] {
        group.bench_with_input(BenchmarkId::new("200_files", name), &compressed, |b, &compressed| {
            b.iter(|| {
                let data = TempDir::new().expect("Failed to create temp dir");
                let config = config(corpus.path(), data.path().join("index"), compressed);
                build_index(&config, &BuildOptions::default()).expect("Failed to build index")
            })
        });
    }
    group.finish();
}

fn bench_batch_trie(c: &mut Criterion) {
    let corpus = create_corpus(50);
    let files: Vec<_> = fs::read_dir(corpus.path())
        .unwrap()
        .map(|entry| fs::read_to_string(entry.unwrap().path()).unwrap())
        .map(|src| parse_source(&src, SyntaxOptions::default()).unwrap())
        .collect();

    c.bench_function("batch_trie_50_files", |b| {
        b.iter(|| {
            let mut batch = BatchTrie::new(TrieKind::Compressed);
            for file in &files {
                for statement in &file.statements {
                    batch.add(&statement.labels, None).unwrap();
                }
            }
            black_box(batch.edge_count())
        })
    });
}

fn bench_find(c: &mut Criterion) {
    let corpus = create_corpus(200);
    let data = TempDir::new().expect("Failed to create temp dir");
    let config = config(corpus.path(), data.path().join("index"), true);
    let summary = build_index(&config, &BuildOptions::default()).expect("Failed to build index");

    let layout = config.layout(&summary.data_dir);
    let trie = PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadOnly).unwrap();

    let single = parse_query("y = Math.min(y, 100);", SyntaxOptions::default()).unwrap();
    let sequence = parse_query("count = 0; System.out.println(\"x\");", SyntaxOptions::default()).unwrap();

    let mut group = c.benchmark_group("find");
    group.bench_function("single_statement", |b| {
        b.iter(|| trie.find(black_box(&single[0])).unwrap())
    });
    group.bench_function("sequence", |b| {
        b.iter(|| trie.find_sequence(black_box(&sequence)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_batch_trie, bench_find);
criterion_main!(benches);
