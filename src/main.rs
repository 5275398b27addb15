//! Treedoc CLI - dump binary files as JSON documents with offloaded blobs

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use treedoc::config::{self, TreedocConfig};
use treedoc::descriptor::{find_descriptor, FormatDescriptor};
use treedoc::formats;
use treedoc::sink::DirectorySink;
use treedoc::storage::SqliteArtifactStore;
use treedoc::ui::{self, Icons};
use treedoc::{ArtifactSink, Layout, SerializeStats, TreeSerializer};

#[derive(Parser)]
#[command(name = "treedoc")]
#[command(version)]
#[command(about = "Dump the parse tree of a binary file as JSON, offloading large blobs")]
#[command(long_about = r#"
Treedoc parses a binary file with a built-in grammar and writes its parse
tree as a JSON document. Small byte blobs are inlined as hex; larger ones
are stored as artifacts and replaced by a placeholder naming their path.

Example usage:
  treedoc init
  treedoc dump image.png --output image.json
  treedoc artifacts --source image.png
  treedoc extract --id 1 --input image.png --output idat.bin
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true, default_value = "treedoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and write its JSON document
    Dump {
        /// File to parse
        input: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Grammar to parse with
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Path to the artifact database
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Write artifacts as files into this directory instead of the database
        #[arg(long, conflicts_with = "database")]
        artifacts_dir: Option<PathBuf>,

        /// Largest blob inlined as hex, in bytes
        #[arg(long, allow_negative_numbers = true)]
        max_inline: Option<i64>,

        /// Blobs of this size or more are not offloaded, in bytes
        #[arg(long, allow_negative_numbers = true)]
        max_sinkable: Option<i64>,

        /// Single-line output
        #[arg(long)]
        compact: bool,
    },

    /// List stored artifacts
    Artifacts {
        /// Path to the artifact database
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Only artifacts taken from this input
        #[arg(short, long)]
        source: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Write the content of one artifact to a file
    Extract {
        /// Artifact id
        #[arg(long)]
        id: i64,

        /// Path to the artifact database
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Original input, needed for range references
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show the naming metadata of a format
    Describe {
        /// Descriptor file, or a directory holding exactly one
        #[arg(short, long, conflicts_with = "format")]
        path: Option<PathBuf>,

        /// Built-in grammar
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout may carry the document
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = config::load_config(Some(&cli.config))?.unwrap_or_default();

    match cli.command {
        Commands::Dump {
            input,
            output,
            format,
            database,
            artifacts_dir,
            max_inline,
            max_sinkable,
            compact,
        } => run_dump(
            &config,
            DumpArgs {
                input,
                output,
                format,
                database,
                artifacts_dir,
                max_inline,
                max_sinkable,
                compact,
            },
        ),
        Commands::Artifacts { database, source, json } => {
            run_artifacts(&config, database, source.as_deref(), json)
        }
        Commands::Extract {
            id,
            database,
            input,
            output,
        } => run_extract(&config, id, database, input.as_deref(), &output),
        Commands::Describe { path, format } => run_describe(path.as_deref(), format.as_deref()),
        Commands::Init { force } => run_init(&cli.config, force),
    }
}

struct DumpArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    format: String,
    database: Option<PathBuf>,
    artifacts_dir: Option<PathBuf>,
    max_inline: Option<i64>,
    max_sinkable: Option<i64>,
    compact: bool,
}

fn database_path(config: &TreedocConfig, flag: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = match flag.or_else(|| config.database.as_ref().map(PathBuf::from)) {
        Some(path) => path,
        None => config::default_database_path_in(&std::env::current_dir()?),
    };
    Ok(path)
}

fn run_dump(config: &TreedocConfig, args: DumpArgs) -> anyhow::Result<()> {
    let policy = config.to_policy(args.max_inline, args.max_sinkable)?;
    let layout = if args.compact || !config.output.pretty {
        Layout::Compact
    } else {
        Layout::Pretty
    };
    let serializer = TreeSerializer::new(policy).with_layout(layout);

    let grammar = formats::grammar_for(&args.format)?;
    let data = std::fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    tracing::info!("Parsing {} as {}", args.input.display(), grammar.descriptor().display_title());
    let root = grammar.parse(&data)?;

    let source = args.input.display().to_string();
    let stats = match args.artifacts_dir {
        Some(dir) => {
            let mut sink = DirectorySink::create(&dir)?;
            let stats = match write_document(&serializer, &root, args.output.as_deref(), &mut sink) {
                Ok(stats) => stats,
                Err(e) => {
                    sink.discard()?;
                    return Err(e);
                }
            };
            let manifest = sink.finish()?;
            ui::status(Icons::PACKAGE, "Manifest", &manifest.display().to_string());
            stats
        }
        None => {
            let db_path = database_path(config, args.database)?;
            config::ensure_db_dir(&db_path)?;
            let mut store = SqliteArtifactStore::open(&db_path)?.with_source(source.clone());

            // Re-dumping an input replaces its artifacts; a failed dump leaves the old ones.
            store.begin_transaction()?;
            let replaced = store.clear_source(&source)?;
            match write_document(&serializer, &root, args.output.as_deref(), &mut store) {
                Ok(stats) => {
                    store.commit()?;
                    if replaced > 0 {
                        tracing::debug!("Replaced {} artifacts of {}", replaced, source);
                    }
                    ui::status(Icons::DATABASE, "Database", &db_path.display().to_string());
                    stats
                }
                Err(e) => {
                    store.rollback()?;
                    return Err(e);
                }
            }
        }
    };

    if let Some(output) = &args.output {
        ui::status(Icons::FILE, "Document", &output.display().to_string());
    }
    print_stats(&stats);
    Ok(())
}

/// Write the document to `output`, or stdout.
///
/// A file is written under a temporary name and renamed into place only
/// once the whole document is out.
fn write_document(
    serializer: &TreeSerializer,
    root: &treedoc::Record,
    output: Option<&Path>,
    sink: &mut dyn ArtifactSink,
) -> anyhow::Result<SerializeStats> {
    let Some(output) = output else {
        let stdout = std::io::stdout();
        let mut writer = BufWriter::new(stdout.lock());
        let stats = serializer.write(root, &mut writer, sink)?;
        writeln!(writer)?;
        writer.flush()?;
        return Ok(stats);
    };

    let file_name = output
        .file_name()
        .with_context(|| format!("{} is not a file path", output.display()))?;
    let temp = output.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = std::fs::File::create(&temp)
        .map_err(treedoc::Error::from)
        .and_then(|file| serializer.write(root, BufWriter::new(file), sink));
    match written {
        Ok(stats) => {
            std::fs::rename(&temp, output)
                .with_context(|| format!("failed to move document to {}", output.display()))?;
            Ok(stats)
        }
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&temp) {
                tracing::debug!("Could not remove {}: {}", temp.display(), cleanup);
            }
            Err(e.into())
        }
    }
}

fn print_stats(stats: &SerializeStats) {
    let nodes = stats.nodes.to_string();
    let fields = stats.fields.to_string();
    let inlined = stats.blobs_inlined.to_string();
    let copied = stats.blobs_copied.to_string();
    let referenced = stats.blobs_referenced.to_string();
    let refused = stats.blobs_refused.to_string();
    eprintln!(
        "{}",
        ui::stats_table(&[
            ("Nodes", &nodes),
            ("Fields", &fields),
            ("Blobs inlined", &inlined),
            ("Blobs copied", &copied),
            ("Blobs referenced", &referenced),
            ("Blobs refused", &refused),
        ])
    );
    if stats.blobs_refused > 0 {
        ui::warn(&format!("{} blobs were too large to store", stats.blobs_refused));
    }
}

fn run_artifacts(
    config: &TreedocConfig,
    database: Option<PathBuf>,
    source: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let db_path = database_path(config, database)?;
    if !db_path.exists() {
        anyhow::bail!("no artifact database at {}", db_path.display());
    }
    let store = SqliteArtifactStore::open(&db_path)?;
    let artifacts = store.list(source)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    if artifacts.is_empty() {
        ui::info("Artifacts", "none");
        return Ok(());
    }
    println!("{}", ui::artifact_table(&artifacts));
    ui::summary_row("Total", &artifacts.len().to_string());
    Ok(())
}

fn run_extract(
    config: &TreedocConfig,
    id: i64,
    database: Option<PathBuf>,
    input: Option<&Path>,
    output: &Path,
) -> anyhow::Result<()> {
    let db_path = database_path(config, database)?;
    let store = SqliteArtifactStore::open(&db_path)?;
    let artifact = store
        .get(id)?
        .with_context(|| format!("no artifact with id {} in {}", id, db_path.display()))?;

    let source = match input {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let content = store.materialize(&artifact, source.as_deref())?;
    std::fs::write(output, &content)?;

    ui::success(&format!(
        "Extracted {} ({}) to {}",
        artifact.path,
        ui::human_bytes(content.len() as u64),
        output.display()
    ));
    Ok(())
}

fn run_describe(path: Option<&Path>, format: Option<&str>) -> anyhow::Result<()> {
    let descriptor = match (path, format) {
        (Some(path), _) => {
            let file = if path.is_dir() {
                find_descriptor(path)?
            } else {
                path.to_path_buf()
            };
            FormatDescriptor::load(&file)?
        }
        (None, format) => formats::grammar_for(format.unwrap_or("png"))?.descriptor().clone(),
    };

    ui::header(&descriptor.display_title());
    ui::summary_row("Id", &descriptor.id);
    ui::summary_row("Plugin", &descriptor.plugin_name());
    ui::summary_row("Description", &descriptor.description());
    Ok(())
}

fn run_init(path: &Path, force: bool) -> anyhow::Result<()> {
    let config = TreedocConfig::default();
    config::write_config(path, &config, force)?;
    ui::success(&format!("Wrote {}", path.display()));
    ui::summary_row(
        "max_inline_length",
        &config.policy.max_inline_length.to_string(),
    );
    ui::summary_row(
        "max_sinkable_size",
        &ui::human_bytes(config.policy.max_sinkable_size as u64),
    );
    Ok(())
}
