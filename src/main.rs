use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use reposeek_chunker::chunk::CodeChunk;
use reposeek_core::{OutputFormat, ReposeekConfig, SearchResult};
use reposeek_index::embedding::EmbeddingClient;
use reposeek_index::repo::{clone_repo, ClonedRepo, RepoSource};
use reposeek_index::search::{IndexReport, SearchEngine};
use reposeek_index::store::{IndexStats, VectorStore};

const CONFIG_FILE: &str = ".reposeek.toml";
const INDEX_PATH: &str = ".reposeek/index.db";
const QUIT_WORDS: [&str; 3] = ["quit", "exit", "q"];
const DOCSTRING_PREVIEW_CHARS: usize = 80;
const CODE_PREVIEW_LINES: usize = 8;

#[derive(Parser)]
#[command(
    name = "reposeek",
    version,
    about = "Semantic code search for Python repositories",
    long_about = "Reposeek splits a repository into functions, methods, and classes,\n\
                   embeds them, and answers natural-language questions about the code.\n\n\
                   Examples:\n  \
                     reposeek chunks --path .                 List the chunks of a repo\n  \
                     reposeek index --path .                  Build .reposeek/index.db\n  \
                     reposeek search 'where are tokens checked'  Query the index\n  \
                     reposeek ask --repo https://github.com/psf/requests  Interactive session"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .reposeek.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Split a repository into semantic chunks and print them
    #[command(long_about = "Split a repository into semantic chunks and print them.\n\n\
        Every Python file is parsed with tree-sitter; module-level functions, methods,\n\
        and class headers become chunks. No API key is needed.\n\n\
        Examples:\n  reposeek chunks --path .\n  reposeek chunks --repo https://github.com/pallets/click --format json")]
    Chunks {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Remote git URL or local path to chunk instead of --path
        #[arg(long)]
        repo: Option<String>,
    },
    /// Chunk, embed, and store a repository in a local index
    #[command(long_about = "Chunk, embed, and store a repository in a local index.\n\n\
        Requires an embedding API key (embedding.api_key or VOYAGE_API_KEY).\n\
        Unchanged chunks are not re-embedded; chunks that disappeared are removed.\n\n\
        Examples:\n  reposeek index --path .\n  reposeek index --repo https://github.com/psf/requests --db requests.db")]
    Index {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Remote git URL or local path to index instead of --path
        #[arg(long)]
        repo: Option<String>,

        /// Index database (default: <path>/.reposeek/index.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Discard the existing index before indexing
        #[arg(long)]
        rebuild: bool,
    },
    /// Query an existing index
    #[command(long_about = "Query an existing index with natural language.\n\n\
        Examples:\n  reposeek search 'retry logic for HTTP requests'\n  reposeek search 'config loading' --limit 10 --format json")]
    Search {
        /// Natural-language query
        query: String,

        /// Repository path whose index to use (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Index database (default: <path>/.reposeek/index.db)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Maximum results to return (default: search.top_k)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Index a repository in memory and answer questions interactively
    #[command(long_about = "Index a repository in memory and answer questions interactively.\n\n\
        Reads one query per line from stdin; type quit, exit, or q to leave.\n\n\
        Examples:\n  reposeek ask --repo https://github.com/psf/requests\n  reposeek ask --path ./my-project")]
    Ask {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Remote git URL or local path to load instead of --path
        #[arg(long)]
        repo: Option<String>,
    },
    /// Write a default .reposeek.toml in the current directory
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Reposeek Configuration

[walker]
# Directory or file names skipped in addition to the built-in list
# (.git, __pycache__, node_modules, venv, .venv, ...)
# exclude = ["migrations", "fixtures"]
# respect_gitignore = false
# max_file_size = 1048576

[chunker]
# max_calls = 15
# max_docstring_chars = 300

[embedding]
# provider = "voyage"
# api_key = "..."            # or set VOYAGE_API_KEY
# model = "voyage-code-3"
# dimensions = 1024          # sent as output_dimension; omit for the model default
# batch_size = 128

[search]
# top_k = 5
"#;

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("warn,reposeek=debug,reposeek_chunker=debug,reposeek_index=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<ReposeekConfig> {
    let config = match explicit {
        Some(path) => ReposeekConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                ReposeekConfig::from_file(default_path)?
            } else {
                ReposeekConfig::default()
            }
        }
    };
    Ok(config)
}

fn spinner(message: impl Into<String>) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message.into());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn finish(spinner: Option<indicatif::ProgressBar>, message: impl Into<String>) {
    if let Some(pb) = spinner {
        pb.finish_with_message(message.into());
    }
}

/// Resolve `--repo`/`--path` to a directory, cloning if needed. The clone
/// lives as long as the returned guard.
fn acquire(path: &Path, repo: Option<&str>) -> Result<(Option<ClonedRepo>, PathBuf)> {
    match repo.map(RepoSource::parse) {
        Some(RepoSource::Remote(url)) => {
            let pb = spinner(format!("Cloning {url}..."));
            let cloned = clone_repo(&url).inspect_err(|_| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Clone failed");
                }
            })?;
            finish(pb, "Cloned");
            let root = cloned.path().to_path_buf();
            Ok((Some(cloned), root))
        }
        Some(RepoSource::Local(local)) => Ok((None, local)),
        None => Ok((None, path.to_path_buf())),
    }
}

fn chunk(root: &Path, config: &ReposeekConfig) -> Result<Vec<CodeChunk>> {
    let pb = spinner("Parsing code...");
    let chunks = reposeek_chunker::chunk_repo(root, config)?;
    finish(pb, format!("Found {} chunks", chunks.len()));
    Ok(chunks)
}

fn embedding_client(config: &ReposeekConfig) -> Result<EmbeddingClient> {
    EmbeddingClient::with_config(&config.embedding).map_err(|e| {
        miette::miette!(
            help = "Set embedding.api_key in .reposeek.toml or export VOYAGE_API_KEY",
            "{e}"
        )
    })
}

fn print_chunks(chunks: &[CodeChunk], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(chunks).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            let mut current_file: Option<&Path> = None;
            for chunk in chunks {
                if current_file != Some(chunk.file_path.as_path()) {
                    println!("\n## {}\n", chunk.file_path.display());
                    current_file = Some(chunk.file_path.as_path());
                }
                println!(
                    "- **{}** ({}) L{}-{}",
                    chunk.qualified_name(),
                    chunk.chunk_type,
                    chunk.start_line,
                    chunk.end_line
                );
            }
        }
        OutputFormat::Text => {
            for chunk in chunks {
                println!(
                    "{}:{}-{}  {:<8}  {}",
                    chunk.file_path.display(),
                    chunk.start_line,
                    chunk.end_line,
                    chunk.chunk_type.to_string(),
                    chunk.qualified_name()
                );
                if let Some(doc) = chunk.docstring.as_deref().filter(|d| !d.is_empty()) {
                    println!("    {}", preview_docstring(doc));
                }
            }
        }
    }
    Ok(())
}

fn preview_docstring(doc: &str) -> String {
    doc.chars().take(DOCSTRING_PREVIEW_CHARS).collect()
}

fn preview_code(code: &str) -> String {
    code.split('\n')
        .take(CODE_PREVIEW_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_results(results: &[SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            for (i, r) in results.iter().enumerate() {
                println!("### {}. {} ({})\n", i + 1, r.display_name(), r.chunk_type);
                println!(
                    "`{}:{}` score {:.3}\n",
                    r.file_path.display(),
                    r.line_start,
                    r.score
                );
                if let Some(doc) = r.docstring.as_deref().filter(|d| !d.is_empty()) {
                    println!("> {}\n", preview_docstring(doc));
                }
                println!("```python\n{}\n```\n", preview_code(&r.code));
            }
        }
        OutputFormat::Text => {
            let rule = "=".repeat(60);
            println!("\n{rule}\n");
            for (i, r) in results.iter().enumerate() {
                println!("{}. {} ({})", i + 1, r.display_name(), r.chunk_type);
                println!("   {}:{}", r.file_path.display(), r.line_start);
                println!("   Score: {:.3}", r.score);
                if let Some(doc) = r.docstring.as_deref().filter(|d| !d.is_empty()) {
                    println!("   \"{}\"", preview_docstring(doc));
                }
                println!("\n{}\n", preview_code(&r.code));
            }
            println!("{rule}\n");
        }
    }
    Ok(())
}

fn print_index_summary(
    report: &IndexReport,
    stats: &IndexStats,
    db: &Path,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "database": db,
                "report": report,
                "stats": stats,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("## Index `{}`\n", db.display());
            println!("| | |\n|---|---|");
            println!("| Embedded | {} |", report.embedded);
            println!("| Unchanged | {} |", report.unchanged);
            println!("| Removed | {} |", report.removed);
            println!("| Chunks | {} |", stats.total_chunks);
            println!("| Files | {} |", stats.total_files);
        }
        OutputFormat::Text => {
            println!(
                "Indexed {} chunks ({} unchanged, {} removed) into {}",
                report.embedded,
                report.unchanged,
                report.removed,
                db.display()
            );
            println!(
                "Index holds {} chunks from {} files ({} KiB)",
                stats.total_chunks,
                stats.total_files,
                stats.index_size_bytes / 1024
            );
        }
    }
    Ok(())
}

async fn run_ask(
    root: &Path,
    config: &ReposeekConfig,
    format: OutputFormat,
) -> Result<()> {
    let chunks = chunk(root, config)?;
    if chunks.is_empty() {
        println!("No Python code found in {}", root.display());
        return Ok(());
    }

    let engine = SearchEngine::new(VectorStore::in_memory()?, embedding_client(config)?);
    let pb = spinner(format!("Embedding {} chunks...", chunks.len()));
    let report = engine.index_chunks(chunks).await.inspect_err(|_| {
        if let Some(pb) = &pb {
            pb.finish_with_message("Embedding failed");
        }
    })?;
    finish(pb, format!("Indexed {} chunks", report.embedded));

    println!("\nReady! Ask questions about the codebase.");
    println!("Type 'quit' to exit.\n");

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        print!("Query: ");
        std::io::stdout().flush().into_diagnostic()?;

        line.clear();
        if input.read_line(&mut line).into_diagnostic()? == 0 {
            break;
        }
        let query = line.trim();
        if QUIT_WORDS.contains(&query.to_lowercase().as_str()) {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let results = engine.search(query, config.search.top_k).await?;
        print_results(&results, format)?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!("format: {}", cli.format);

    match cli.command {
        Command::Chunks { ref path, ref repo } => {
            let (_clone, root) = acquire(path, repo.as_deref())?;
            let chunks = chunk(&root, &config)?;
            print_chunks(&chunks, cli.format)?;
        }
        Command::Index {
            ref path,
            ref repo,
            ref db,
            rebuild,
        } => {
            let db = db.clone().unwrap_or_else(|| path.join(INDEX_PATH));
            let (_clone, root) = acquire(path, repo.as_deref())?;
            let chunks = chunk(&root, &config)?;
            if chunks.is_empty() {
                eprintln!("No Python code found in {}", root.display());
            }

            let store = VectorStore::open(&db)?;
            if rebuild {
                store.clear()?;
            }
            // Unset means the first stored batch records the model's width
            if let Some(dimensions) = config.embedding.dimensions {
                store.ensure_dimensions(dimensions)?;
            }

            let engine = SearchEngine::new(store, embedding_client(&config)?);
            let pb = spinner(format!("Embedding {} chunks...", chunks.len()));
            let report = engine.index_chunks(chunks).await.inspect_err(|_| {
                if let Some(pb) = &pb {
                    pb.finish_with_message("Indexing failed");
                }
            })?;
            finish(pb, "Done");

            let stats = engine.store().stats()?;
            print_index_summary(&report, &stats, &db, cli.format)?;
        }
        Command::Search {
            ref query,
            ref path,
            ref db,
            limit,
        } => {
            let db = db.clone().unwrap_or_else(|| path.join(INDEX_PATH));
            if !db.exists() {
                miette::bail!(miette::miette!(
                    help = "Build it first with: reposeek index --path .",
                    "No index found at {}",
                    db.display()
                ));
            }

            let engine = SearchEngine::new(VectorStore::open(&db)?, embedding_client(&config)?);
            let results = engine
                .search(query, limit.unwrap_or(config.search.top_k))
                .await?;
            if results.is_empty() && cli.format == OutputFormat::Text {
                println!("No results.");
            } else {
                print_results(&results, cli.format)?;
            }
        }
        Command::Ask { ref path, ref repo } => {
            let (_clone, root) = acquire(path, repo.as_deref())?;
            run_ask(&root, &config, cli.format).await?;
        }
        Command::Init => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}
