//! CLI entry point for the graft-curate splice engine.
//!
//! Designed for subprocess invocation from the orchestration layer:
//! reads a JSON request from stdin, writes a JSON result to stdout.
//! Logs go to stderr so stdout stays machine-readable.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use graft_core::{ActorId, GraphId, KnowledgeGraph};
use graft_curate::config::CuratorConfig;
use graft_curate::describe::describe_neighborhood;
use graft_curate::propose::StaticProposer;
use graft_curate::service::{CurationRequest, CurationService};
use graft_curate::splice::{SpliceRequest, Splicer};
use graft_store::{neighborhood, FileGraphStore, GraphStore};

#[derive(Parser)]
#[command(name = "graft-curate")]
#[command(about = "Subgraph reconciliation and splice engine for Graft knowledge graphs")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graft).
    #[arg(short, long, default_value = "graft", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Splice a reconciled subgraph pair into a graph (reads JSON from stdin).
    Splice,
    /// Run a full curation: neighborhood, proposal, splice (reads JSON from stdin).
    Curate,
    /// Fetch the neighborhood around entities matching a query.
    Neighborhood {
        /// Graph to read.
        #[arg(long)]
        graph_id: String,
        /// Free-text query matched against entity names.
        #[arg(long)]
        query: String,
        /// Neighborhood radius.
        #[arg(long)]
        hops: Option<u32>,
    },
    /// Fetch the neighborhood around a randomly chosen entity.
    RandomNeighborhood {
        /// Graph to read.
        #[arg(long)]
        graph_id: String,
        /// Neighborhood radius.
        #[arg(long)]
        hops: Option<u32>,
    },
    /// Render a neighborhood as prose for prompt assembly.
    Describe {
        /// Graph to read.
        #[arg(long)]
        graph_id: String,
        /// Free-text query matched against entity names.
        #[arg(long)]
        query: String,
        /// Neighborhood radius.
        #[arg(long)]
        hops: Option<u32>,
    },
}

/// Stdin payload for `curate`: the proposal is produced out of process
/// and handed in whole alongside the raw input text.
#[derive(Deserialize)]
struct CurateInput {
    graph_id: GraphId,
    actor_id: ActorId,
    input: String,
    proposed: KnowledgeGraph,
    hops: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    let curator_config = load_curator_config(&cli.config)?;
    let store = Arc::new(FileGraphStore::new(&curator_config.store_root)?);

    match cli.command {
        Command::Splice => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let request: SpliceRequest = serde_json::from_str(&input)?;
            let splicer = Splicer::new(store);
            let outcome = splicer.splice(&request).await;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Curate => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let payload: CurateInput = serde_json::from_str(&input)?;
            let proposer = Arc::new(StaticProposer::new(payload.proposed));
            let service = CurationService::new(store, proposer, curator_config);
            let request = CurationRequest {
                graph_id: payload.graph_id,
                actor_id: payload.actor_id,
                input: payload.input,
                hops: payload.hops,
            };
            let outcome = service
                .run_single_curation(&request, uuid::Uuid::new_v4())
                .await?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Neighborhood {
            ref graph_id,
            ref query,
            hops,
        } => {
            let subgraph =
                fetch_query_neighborhood(&*store, graph_id, query, hops, &curator_config).await?;
            println!("{}", serde_json::to_string(&subgraph)?);
        }
        Command::RandomNeighborhood { ref graph_id, hops } => {
            let graph_id = GraphId::new(graph_id);
            let hops = hops.unwrap_or(curator_config.default_hops);
            let full = store.fetch_full_graph(&graph_id).await?;
            let seeds = neighborhood::random_seed(&full).into_iter().collect();
            let subgraph = store.fetch_neighborhood(&graph_id, &seeds, hops).await?;
            println!("{}", serde_json::to_string(&subgraph)?);
        }
        Command::Describe {
            ref graph_id,
            ref query,
            hops,
        } => {
            let subgraph =
                fetch_query_neighborhood(&*store, graph_id, query, hops, &curator_config).await?;
            println!("{}", describe_neighborhood(&subgraph));
        }
    }

    Ok(())
}

async fn fetch_query_neighborhood(
    store: &FileGraphStore,
    graph_id: &str,
    query: &str,
    hops: Option<u32>,
    curator_config: &CuratorConfig,
) -> anyhow::Result<KnowledgeGraph> {
    let graph_id = GraphId::new(graph_id);
    let hops = hops.unwrap_or(curator_config.default_hops);
    let full = store.fetch_full_graph(&graph_id).await?;
    let seeds = neighborhood::relevant_entity_ids(&full, query);
    Ok(store.fetch_neighborhood(&graph_id, &seeds, hops).await?)
}

fn load_curator_config(file_prefix: &str) -> anyhow::Result<CuratorConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("GRAFT_CURATE")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<CuratorConfig>("curator") {
        Ok(c) => Ok(c),
        Err(_) => Ok(CuratorConfig::default()),
    }
}
