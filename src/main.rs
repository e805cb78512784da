use anyhow::Context;
use clap::{Parser, Subcommand};
use fhir_schema_graph::{build_descriptors, build_graph, render, source};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "fhir-schema-graph")]
#[command(about = "Compile FHIR turtle definitions into a relational schema", long_about = None)]
struct Cli {
    /// Debug logging (overridden by RUST_LOG).
    #[arg(short = 'D', long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate SQL and relationship metadata from a directory of pages.
    Generate {
        /// Directory holding the `*.ttl` specification pages.
        #[arg(long)]
        source: PathBuf,

        /// Resources to materialize; all concrete entities when omitted.
        #[arg(short = 'r', long = "resources", num_args = 1..)]
        resources: Vec<String>,

        #[arg(short = 's', long)]
        sql_file: PathBuf,

        #[arg(short = 'm', long)]
        metadata_dir: Option<PathBuf>,

        /// Also dump every descriptor as JSON.
        #[arg(long)]
        descriptors: Option<PathBuf>,
    },
}

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.cmd {
        Commands::Generate {
            source,
            resources,
            sql_file,
            metadata_dir,
            descriptors,
        } => {
            // 1) Read pages and build the graph.
            let pages = source::read_pages(&source)?;
            let blocks = pages
                .iter()
                .flat_map(|page| &page.blocks)
                .map(|block| &block.lines);
            let graph = build_graph(blocks)
                .with_context(|| format!("build schema graph from {}", source.display()))?;

            // 2) Select and emit.
            let emitted = build_descriptors(&graph, &resources)?;

            // 3) Write outputs.
            render::write_sql(&sql_file, &emitted)?;
            if let Some(dir) = &metadata_dir {
                render::write_metadata(dir, &emitted)?;
            }
            if let Some(path) = &descriptors {
                render::write_descriptors(path, &emitted)?;
            }
            println!(
                "Wrote {} tables to {}",
                emitted.tables.len(),
                sql_file.display()
            );
        }
    }

    Ok(())
}
