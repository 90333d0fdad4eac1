use clap::Parser;
use server::{BackendConfig, BackendService, Inventory};
use shared::{BackendDirectory, PartitionKey, BROKER_BACKEND_PORT};
use std::path::PathBuf;

/// Starts one backend server on its well-known port, pushes its rooms to the
/// main server and answers requests until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Partition served: S, D or U
        #[clap(short, long)]
        name: char,
        /// Room file, `room,count` per line [default: by partition]
        #[clap(short, long)]
        inventory: Option<PathBuf>,
    }

    if std::env::var_os("RUST_LOG").is_none() {
        eprintln!("Hint: set RUST_LOG=info to see the server's progress");
    }
    env_logger::init();

    let args = Args::parse();
    let name = PartitionKey::new(args.name);

    let port = BackendDirectory::default()
        .port_of(name)
        .ok_or_else(|| format!("unknown backend server {}", name))?;
    let path = args
        .inventory
        .unwrap_or_else(|| PathBuf::from(name.default_inventory_file()));

    let backend = BackendService::bind(BackendConfig {
        name,
        port,
        broker_port: BROKER_BACKEND_PORT,
    })
    .await?;

    let inventory = Inventory::load(&path).await?;

    backend
        .run_until(inventory, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
