/*!
# BSL Intellisense CLI

Command-line interface for the BSL / OneScript language engine: runs the
language server, indexes a workspace, prints module outlines, re-indents
modules and queries the standard-library catalogs.
*/

use anyhow::{Context, Result};
use bsl_intellisense::cli_common::{self, OutputFormat, OutputWriter};
use bsl_intellisense::core::{normalize_path, read_source_file};
use bsl_intellisense::parser::{Dialect, Symbol};
use bsl_intellisense::query::format::apply_indent_edits;
use bsl_intellisense::query::FormatOptions;
use bsl_intellisense::{EngineConfig, LanguageEngine, RebuildOutcome};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "bsl-intellisense",
    version = env!("CARGO_PKG_VERSION"),
    author = "BSL Analyzer Team",
    about = "Code intelligence for BSL (1C:Enterprise) and OneScript"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Configuration file (defaults to bsl-intellisense.toml in the workspace root)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the language server over stdio
    Lsp,

    /// Index a workspace and print statistics
    Index {
        /// Workspace root
        root: PathBuf,

        /// Remove the on-disk table cache before indexing
        #[arg(long)]
        clear_cache: bool,
    },

    /// Print the symbols declared in a module
    Symbols {
        /// BSL or OneScript source file
        file: PathBuf,
    },

    /// Fuzzy search for module-level symbols in a workspace
    Search {
        /// Workspace root
        root: PathBuf,

        /// Search text
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Re-indent a module by block nesting
    Fmt {
        /// BSL or OneScript source file
        file: PathBuf,

        /// Indent with this many spaces instead of tabs
        #[arg(long)]
        spaces: Option<usize>,

        /// Rewrite the file instead of printing the result
        #[arg(short, long)]
        write: bool,
    },

    /// Browse the standard-library catalog
    Catalog {
        /// Case-insensitive substring filter
        filter: Option<String>,

        #[arg(short, long, value_enum, default_value = "bsl")]
        dialect: DialectArg,

        /// Maximum number of results
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    Bsl,
    Oscript,
}

impl From<DialectArg> for Dialect {
    fn from(value: DialectArg) -> Self {
        match value {
            DialectArg::Bsl => Dialect::Bsl,
            DialectArg::Oscript => Dialect::OneScript,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Lsp = cli.command {
        cli_common::init_lsp_logging()?;
        return bsl_intellisense::lsp::start_stdio_server().await;
    }

    cli_common::init_logging(cli.verbose)?;

    let result = match &cli.command {
        Commands::Lsp => Ok(()),
        Commands::Index { root, clear_cache } => {
            cmd_index(root, *clear_cache, cli.config.as_deref(), cli.format)
        }
        Commands::Symbols { file } => cmd_symbols(file, cli.config.as_deref(), cli.format),
        Commands::Search { root, query, limit } => {
            cmd_search(root, query, *limit, cli.config.as_deref(), cli.format)
        }
        Commands::Fmt {
            file,
            spaces,
            write,
        } => cmd_fmt(file, *spaces, *write, cli.format),
        Commands::Catalog {
            filter,
            dialect,
            limit,
        } => cmd_catalog(
            filter.as_deref().unwrap_or(""),
            (*dialect).into(),
            *limit,
            cli.config.as_deref(),
            cli.format,
        ),
    };

    if let Err(e) = result {
        cli_common::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(explicit: Option<&Path>, root: Option<&Path>) -> Result<EngineConfig> {
    let config = match (explicit, root) {
        (Some(path), _) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, Some(root)) => EngineConfig::discover(root)
            .with_context(|| format!("Failed to load config from {}", root.display()))?,
        (None, None) => EngineConfig::default(),
    };
    Ok(config)
}

fn build_engine(config: EngineConfig) -> Result<LanguageEngine> {
    LanguageEngine::new(config).context("Failed to initialize the language engine")
}

#[derive(Serialize)]
struct IndexReport {
    root: PathBuf,
    files: usize,
    failed: usize,
    symbols: usize,
    elapsed_ms: u128,
}

fn cmd_index(
    root: &Path,
    clear_cache: bool,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    cli_common::validate_path(root, "Workspace root")?;
    let engine = build_engine(load_config(config, Some(root))?)?;

    if clear_cache {
        if let Some(cache) = engine.cache().disk_cache() {
            let removed = cache.clear().context("Failed to clear table cache")?;
            info!("Removed {} cached tables from {}", removed, cache.cache_dir().display());
        }
    }

    let outcome = engine
        .cache()
        .full_rebuild(root)
        .with_context(|| format!("Failed to index {}", root.display()))?;

    let (files, failed, elapsed) = match outcome {
        RebuildOutcome::Completed {
            files,
            failed,
            elapsed,
            ..
        } => (files, failed, elapsed),
        RebuildOutcome::Superseded { .. } => {
            anyhow::bail!("Indexing was superseded by another rebuild")
        }
    };
    let snapshot = engine.cache().snapshot();
    let report = IndexReport {
        root: root.to_path_buf(),
        files,
        failed,
        symbols: snapshot.symbol_count(),
        elapsed_ms: elapsed.as_millis(),
    };

    let mut out = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => out.write_object(&report)?,
        OutputFormat::Text | OutputFormat::Table => {
            out.write_header(&format!("Workspace {}", root.display()))?;
            out.write_line(&format!("Files indexed:  {}", report.files))?;
            out.write_line(&format!("Symbols:        {}", report.symbols))?;
            out.write_line(&format!("Time:           {}", cli_common::format_duration(elapsed)))?;
            if failed > 0 {
                cli_common::print_warning(&format!("{} files could not be read", failed));
            } else {
                cli_common::print_success("Indexing complete");
            }
        }
    }
    out.flush()
}

fn symbol_row(symbol: &Symbol) -> Vec<String> {
    vec![
        symbol.signature_label(),
        symbol.kind.to_string(),
        (symbol.source_range.start_line + 1).to_string(),
        if symbol.is_exported { "yes" } else { "" }.to_string(),
        symbol.region.clone().unwrap_or_default(),
    ]
}

fn cmd_symbols(file: &Path, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    cli_common::validate_path(file, "Source file")?;
    let engine = build_engine(load_config(config, file.parent())?)?;
    let text = read_source_file(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let symbols = engine.document_symbols(file, &text);

    let mut out = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => out.write_object(&symbols)?,
        OutputFormat::Table => out.write_table(
            &["Symbol", "Kind", "Line", "Export", "Region"],
            symbols.iter().map(symbol_row).collect(),
        )?,
        OutputFormat::Text => {
            for symbol in &symbols {
                let export = if symbol.is_exported { " Экспорт" } else { "" };
                out.write_line(&format!(
                    "{:>5}  {:<10} {}{}",
                    symbol.source_range.start_line + 1,
                    symbol.kind.to_string(),
                    symbol.signature_label(),
                    export
                ))?;
            }
        }
    }
    out.flush()
}

fn cmd_search(
    root: &Path,
    query: &str,
    limit: usize,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    cli_common::validate_path(root, "Workspace root")?;
    let engine = build_engine(load_config(config, Some(root))?)?;
    engine
        .cache()
        .full_rebuild(root)
        .with_context(|| format!("Failed to index {}", root.display()))?;

    let mut matches = engine.workspace_symbols(query);
    matches.truncate(limit);

    let mut out = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => out.write_object(&matches)?,
        OutputFormat::Table => out.write_table(
            &["Symbol", "Kind", "File", "Line"],
            matches
                .iter()
                .map(|m| {
                    vec![
                        m.symbol.name.clone(),
                        m.symbol.kind.to_string(),
                        relative(root, m.symbol.file()),
                        (m.symbol.source_range.start_line + 1).to_string(),
                    ]
                })
                .collect(),
        )?,
        OutputFormat::Text => {
            for m in &matches {
                out.write_line(&format!(
                    "{}:{}: {}",
                    relative(root, m.symbol.file()),
                    m.symbol.source_range.start_line + 1,
                    m.symbol.signature_label()
                ))?;
            }
        }
    }
    out.flush()
}

fn cmd_fmt(file: &Path, spaces: Option<usize>, write: bool, format: OutputFormat) -> Result<()> {
    cli_common::validate_path(file, "Source file")?;
    let engine = build_engine(load_config(None, file.parent())?)?;
    let text = read_source_file(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let options = match spaces {
        Some(tab_size) => FormatOptions {
            tab_size,
            insert_spaces: true,
        },
        None => FormatOptions::default(),
    };
    let edits = engine.format_edits(&text, None, options);

    if write {
        if !edits.is_empty() {
            let raw = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
            let mut formatted = String::new();
            if raw.starts_with(b"\xEF\xBB\xBF") {
                formatted.push('\u{FEFF}');
            }
            formatted.push_str(&apply_indent_edits(&text, &edits));
            std::fs::write(file, formatted)
                .with_context(|| format!("Failed to write {}", file.display()))?;
        }
        cli_common::print_success(&format!("{} lines re-indented", edits.len()));
        return Ok(());
    }

    let mut out = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => out.write_object(&edits)?,
        OutputFormat::Text | OutputFormat::Table => {
            let formatted = apply_indent_edits(&text, &edits);
            out.write_line(formatted.strip_suffix('\n').unwrap_or(&formatted))?;
        }
    }
    out.flush()
}

fn cmd_catalog(
    filter: &str,
    dialect: Dialect,
    limit: usize,
    config: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let engine = build_engine(load_config(config, None)?)?;
    let locale = engine.locale();
    let mut items = engine.syntax_helper_items(dialect, filter);
    items.truncate(limit);

    let mut out = OutputWriter::stdout(format);
    match format {
        OutputFormat::Json => out.write_object(&items)?,
        OutputFormat::Table => out.write_table(
            &["Name", "Kind", "Path"],
            items
                .iter()
                .map(|item| {
                    vec![
                        item.label.clone(),
                        item.entry.kind.to_string(),
                        item.path.clone(),
                    ]
                })
                .collect(),
        )?,
        OutputFormat::Text => {
            for item in &items {
                out.write_line(&format!(
                    "{}  [{}]",
                    item.entry.signature_label(locale),
                    item.path
                ))?;
            }
        }
    }
    out.flush()
}

fn relative(root: &Path, file: &Path) -> String {
    let root = normalize_path(root);
    file.strip_prefix(&root)
        .unwrap_or(file)
        .display()
        .to_string()
}
