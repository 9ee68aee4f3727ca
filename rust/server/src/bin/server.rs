//! Standalone server binary.
//!
//! Usage: cargo run -p felt-server --bin felt-server

use std::sync::Arc;

use clap::Parser;

use felt_engine::state::TableConfig;
use felt_server::admin::AdminApi;
use felt_server::persist::{
    HandHistorySink, JsonlHandHistory, MemoryHandHistory, MemorySnapshotStore,
};
use felt_server::registry::InMemoryRegistry;
use felt_server::settings::Timing;
use felt_server::{AppContext, GameServer, ServerConfig};

/// felt - multi-table no-limit hold'em server
#[derive(Parser, Debug)]
#[command(name = "felt-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind to
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Tables to create at startup
    #[arg(long, default_value_t = 1)]
    tables: usize,

    /// Bots seated at each starting table
    #[arg(long, default_value_t = 0)]
    bots: usize,

    /// Hand-history JSONL base path (one dated file per UTC day);
    /// omitted keeps history in memory
    #[arg(long)]
    history_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    felt_server::init_logging();
    let args = Args::parse();

    let history: Arc<dyn HandHistorySink> = match &args.history_file {
        Some(path) => {
            tracing::info!(path = %path.display(), "writing hand history");
            Arc::new(JsonlHandHistory::create(path)?)
        }
        None => Arc::new(MemoryHandHistory::new()),
    };
    let context = AppContext::with_collaborators(
        ServerConfig::new(args.host.clone(), args.port),
        Arc::new(InMemoryRegistry::new()),
        Arc::new(MemorySnapshotStore::new()),
        history,
        Timing::from_env(),
    );

    let admin = AdminApi::new(context.clone());
    for i in 0..args.tables {
        let record = admin.create_table(format!("table-{}", i + 1), TableConfig::default());
        for _ in 0..args.bots {
            admin.add_bot(record.id, "baseline");
        }
    }

    let server = GameServer::from_context(context);
    let handle = server.start().await?;
    tracing::info!(address = %handle.address(), "serving /ws");
    println!("felt-server listening on ws://{}/ws", handle.address());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.shutdown().await?;
    println!("server stopped");
    Ok(())
}
