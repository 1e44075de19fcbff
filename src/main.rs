use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::PathBuf;
use stmtrie::index::storage::OpenMode;
use stmtrie::index::{BuildOptions, IndexConfig, PersistentTrie, build_index, stats};
use stmtrie::syntax::{SyntaxOptions, parse_query};
use stmtrie::{output, utils};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stmtrie")]
#[command(about = "Statement-level code clone index backed by a persistent trie")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Where to find the configuration and the index files
#[derive(Args)]
struct Location {
    /// Index directory (defaults to the app data dir entry for the source dir)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or extend the index for a source tree
    Index {
        /// Root of the corpus
        source_dir: PathBuf,

        /// Project name stored with every position
        #[arg(short, long)]
        project: Option<String>,

        /// Source files per merge batch
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Build a plain (one label per edge) trie
        #[arg(long)]
        plain: bool,

        /// Discard any existing index first
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        location: Location,
    },
    /// Find the occurrences of a statement or statement sequence
    Find {
        /// Source code of one or more statements
        code: String,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        location: Location,
    },
    /// Show index statistics
    Stats {
        #[command(flatten)]
        location: Location,
    },
    /// Print every edge of the trie
    Dump {
        #[command(flatten)]
        location: Location,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Index {
            source_dir,
            project,
            batch_size,
            plain,
            force,
            location,
        } => {
            let mut config = load_config(&location)?;
            config.source_dir = source_dir;
            if let Some(project) = project {
                config.project = project;
            }
            if let Some(batch_size) = batch_size {
                config.batch_file_size = batch_size;
            }
            if plain {
                config.compressed = false;
            }
            config.verbose |= cli.verbose;

            let options = BuildOptions {
                force,
                show_progress: std::io::stderr().is_terminal(),
            };
            let summary = build_index(&config, &options)?;
            println!(
                "Indexed {} files ({} statements) into {}",
                summary.files_indexed,
                summary.statements,
                summary.data_dir.display()
            );
            if summary.files_failed > 0 {
                println!("Skipped {} files that could not be parsed", summary.files_failed);
            }
        }
        Commands::Find {
            code,
            json,
            location,
        } => {
            let config = load_config(&location)?;
            let trie = open_index(&config)?;
            let syntax = SyntaxOptions {
                rename_identifiers: config.rename_identifiers,
            };
            let statements = parse_query(&code, syntax).context("Failed to parse query")?;

            match statements.as_slice() {
                [] => bail!("query contains no statements"),
                [single] => {
                    let positions = trie.find(single)?;
                    tracing::debug!("{} matches", positions.len());
                    if json {
                        output::print_json(&positions)?;
                    } else {
                        output::print_positions(&positions, std::io::stdout().is_terminal())?;
                    }
                }
                _ => {
                    let chains = trie.find_sequence(&statements)?;
                    tracing::debug!("{} matching sequences", chains.len());
                    if json {
                        output::print_json(&chains)?;
                    } else {
                        output::print_sequences(&chains, std::io::stdout().is_terminal())?;
                    }
                }
            }
        }
        Commands::Stats { location } => {
            let config = load_config(&location)?;
            let data_dir = utils::resolve_data_dir(&config)?;
            let trie = open_index(&config)?;
            stats::write_stats(&mut std::io::stdout().lock(), &data_dir, &trie.meta())?;
        }
        Commands::Dump { location } => {
            let config = load_config(&location)?;
            let trie = open_index(&config)?;
            trie.dump(&mut std::io::stdout().lock())?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(location: &Location) -> Result<IndexConfig> {
    let mut config = utils::load_config(location.config.as_deref())?;
    if let Some(data) = &location.data {
        config.data_path = Some(data.clone());
    }
    Ok(config)
}

fn open_index(config: &IndexConfig) -> Result<PersistentTrie> {
    let data_dir = utils::resolve_data_dir(config)?;
    let layout = config.layout(&data_dir);
    if !PersistentTrie::exists(&layout) {
        bail!(
            "No index found at {}. Run 'stmtrie index <SOURCE_DIR>' first",
            data_dir.display()
        );
    }
    PersistentTrie::open(&layout, config.page_sizes(), OpenMode::ReadOnly)
        .with_context(|| format!("Failed to open index at {}", data_dir.display()))
}
