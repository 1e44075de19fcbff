use crate::index::batch::BatchTrie;
use crate::index::storage::OpenMode;
use crate::index::trie::PersistentTrie;
use crate::index::types::{IndexConfig, Pos};
use crate::syntax::{FileStatements, SyntaxOptions, parse_source};
use crate::utils::{Progress, remove_index_dir, resolve_data_dir};
use anyhow::{Context, Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Knobs of one indexing run that are not part of the stored configuration
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Start from an empty index even if one exists
    pub force: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    pub data_dir: PathBuf,
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_failed: usize,
    pub statements: usize,
    pub batches: usize,
}

/// A source file tokenized off the merge thread
struct ParsedFile {
    rel_path: String,
    result: crate::error::Result<FileStatements>,
}

/// Build (or extend) the index described by `config`
pub fn build_index(config: &IndexConfig, options: &BuildOptions) -> Result<BuildSummary> {
    let root = config
        .source_dir
        .canonicalize()
        .with_context(|| format!("Invalid source directory {}", config.source_dir.display()))?;
    let data_dir = resolve_data_dir(config)?;
    let layout = config.layout(&data_dir);

    if options.force {
        remove_index_dir(&data_dir)?;
    }

    let mut trie = if PersistentTrie::exists(&layout) {
        let trie = PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadWrite)
            .with_context(|| format!("Failed to open index at {}", data_dir.display()))?;
        if trie.kind() != config.kind() {
            bail!(
                "index at {} is {:?}, configuration asks for {:?} (use --force to rebuild)",
                data_dir.display(),
                trie.kind(),
                config.kind()
            );
        }
        trie
    } else {
        PersistentTrie::initialize(&layout, config.page_sizes(), config.kind())
            .with_context(|| format!("Failed to create index at {}", data_dir.display()))?
    };

    tracing::info!("indexing {} into {}", root.display(), data_dir.display());

    let spinner = Progress::spinner(options.show_progress, "Discovering files...");
    let files = collect_files(&root, &config.include)?;
    spinner.finish(format!("Found {} files", files.len()));

    let syntax = SyntaxOptions {
        rename_identifiers: config.rename_identifiers,
    };
    let batch_size = config.batch_file_size.max(1);
    let mut batch = BatchTrie::new(config.kind());
    let mut summary = BuildSummary {
        data_dir: data_dir.clone(),
        files_seen: files.len(),
        ..Default::default()
    };

    let progress = Progress::bar(options.show_progress, files.len() as u64, "Indexing files...");
    for chunk in files.chunks(batch_size) {
        let parsed: Vec<ParsedFile> = chunk
            .par_iter()
            .map(|(full_path, rel_path)| ParsedFile {
                rel_path: rel_path.clone(),
                result: read_and_parse(full_path, syntax),
            })
            .collect();

        for file in parsed {
            progress.inc(1);
            match file.result {
                Ok(statements) => {
                    let count = add_file(&mut batch, &config.project, &file.rel_path, statements)
                        .with_context(|| format!("Failed to add {}", file.rel_path))?;
                    if config.verbose {
                        tracing::info!("{}: {} statements", file.rel_path, count);
                    } else {
                        tracing::debug!("{}: {} statements", file.rel_path, count);
                    }
                    summary.statements += count;
                    summary.files_indexed += 1;
                }
                Err(e) if e.is_input_error() || matches!(e, crate::error::TrieError::Io(_)) => {
                    tracing::warn!("skipping {}: {}", file.rel_path, e);
                    summary.files_failed += 1;
                }
                Err(e) => return Err(e).with_context(|| format!("Failed to parse {}", file.rel_path)),
            }
        }

        if !batch.is_empty() {
            trie.add_trie(&batch).context("Failed to merge batch")?;
            summary.batches += 1;
        }
        batch.reset();
    }
    progress.finish(format!("Indexed {} files", summary.files_indexed));

    trie.close().context("Failed to close index")?;

    tracing::info!(
        "indexed {} of {} files ({} statements, {} batches, {} skipped)",
        summary.files_indexed,
        summary.files_seen,
        summary.statements,
        summary.batches,
        summary.files_failed
    );
    Ok(summary)
}

/// Add every statement of a file to the batch; returns the statement count
fn add_file(
    batch: &mut BatchTrie,
    project: &str,
    rel_path: &str,
    file: FileStatements,
) -> crate::error::Result<usize> {
    let positions: Vec<Pos> = file
        .statements
        .iter()
        .map(|s| Pos::new(project, rel_path, s.start, s.end).with_method(s.method_start, s.method_end))
        .collect();

    for (statement, pos) in file.statements.iter().zip(&positions) {
        batch.add(&statement.labels, Some(pos.clone()))?;
    }
    for &(prev, next) in &file.next {
        if let (Some(prev), Some(next)) = (positions.get(prev), positions.get(next)) {
            batch.next_stmt(prev.clone(), next.clone());
        }
    }
    Ok(file.statements.len())
}

fn read_and_parse(path: &Path, options: SyntaxOptions) -> crate::error::Result<FileStatements> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    parse_source(&text, options)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid include pattern {:?}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Source files under `root` matching `include`, sorted by relative path
fn collect_files(root: &Path, include: &[String]) -> Result<Vec<(PathBuf, String)>> {
    let matcher = build_globset(include)?;

    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !matches!(name.as_ref(), ".git" | "target" | "build" | "out" | "node_modules")
        })
        .build();

    let mut files: Vec<(PathBuf, String)> = walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|entry| {
            let path = entry.path().to_path_buf();
            let rel = path.strip_prefix(root).ok()?;
            if !matcher.is_match(rel) {
                return None;
            }
            let rel = rel.to_string_lossy().replace('\\', "/");
            Some((path, rel))
        })
        .collect();

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_collect_files_honors_include() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/A.java", "class A {}");
        write(dir.path(), "src/deep/B.java", "class B {}");
        write(dir.path(), "README.md", "# readme");

        let files = collect_files(dir.path(), &["**/*.java".to_string()]).unwrap();
        let rels: Vec<_> = files.iter().map(|(_, rel)| rel.as_str()).collect();
        assert_eq!(rels, vec!["src/A.java", "src/deep/B.java"]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(build_globset(&["a[".to_string()]).is_err());
    }

    #[test]
    fn test_build_skips_malformed_files() {
        let src = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write(src.path(), "Good.java", "class Good { int f() { return 1; } }");
        write(src.path(), "Bad.java", "class Bad { int f() { return \"oops; } }");

        let config = IndexConfig {
            source_dir: src.path().to_path_buf(),
            data_path: Some(data.path().join("index")),
            project: "demo".to_string(),
            ..Default::default()
        };
        let summary = build_index(&config, &BuildOptions::default()).unwrap();

        assert_eq!(summary.files_seen, 2);
        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(summary.statements, 1);
        assert_eq!(summary.batches, 1);
    }

    #[test]
    fn test_build_skips_deeply_nested_file() {
        let src = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        write(src.path(), "Good.java", "class Good { int f() { return 1; } }");
        let depth = 10_000;
        let deep = format!(
            "class Deep {{ void m() {{ {} b; {} }} }}",
            "{".repeat(depth),
            "}".repeat(depth)
        );
        write(src.path(), "Deep.java", &deep);

        let config = IndexConfig {
            source_dir: src.path().to_path_buf(),
            data_path: Some(data.path().join("index")),
            ..Default::default()
        };
        let summary = build_index(&config, &BuildOptions::default()).unwrap();

        assert_eq!(summary.files_indexed, 1);
        assert_eq!(summary.files_failed, 1);
    }
}
