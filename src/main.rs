use std::fs::File;
use std::io::BufWriter;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use protein_graph::{
    export_cypher_dump, Credentials, DumpMode, GraphStore, MemoryBackend, MigrationInput, Migrator, SnapshotSource,
};

/// Migrate a protein-interaction and pathway snapshot into a property graph.
///
/// Reads the species name (and optionally protein identifiers, two per
/// pair) from stdin, one per line.
#[derive(Parser, Debug)]
#[command(name = "protein-graph")]
#[command(about = "Relational protein/pathway snapshot → property graph", long_about = None)]
struct Args {
    /// Path to the credentials JSON file that will be used
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,

    /// KEGG organism ID
    #[arg(long = "kegg_organism_id", default_value = "hsa")]
    kegg_organism_id: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("cannot install logger: {e}");
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut stdin = String::new();
    tokio::io::stdin()
        .read_to_string(&mut stdin)
        .await
        .context("reading stdin")?;
    let input = MigrationInput::parse(&stdin)?;

    let credentials = Credentials::load(&args.credentials)?;
    let config = credentials.migration.clone().with_organism(args.kegg_organism_id);
    info!(
        credentials = %args.credentials.display(),
        organism = %config.organism,
        kegg_dir = %config.kegg_dir.display(),
        "Starting protein-graph v{}",
        env!("CARGO_PKG_VERSION")
    );

    let source = SnapshotSource::open(&credentials.relational.snapshot_dir)?;
    let store = MemoryBackend::new();

    let outcome = Migrator::new(&store, source, config)
        .with_batch_limit(credentials.graph.max_batch_size.and_then(NonZeroUsize::new))
        .run(&input)
        .await;

    let exported = match outcome {
        Ok(_) => export(&store, &credentials.graph.dump_path, DumpMode::from(&input.mode)).await,
        Err(e) => Err(e.into()),
    };
    store.shutdown().await?;
    exported
}

async fn export(store: &MemoryBackend, path: &Path, mode: DumpMode) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let summary = export_cypher_dump(store, &mut writer, mode).await?;
    info!(path = %path.display(), ?mode, nodes = summary.nodes, relationships = summary.relationships, "dump written");
    Ok(())
}
