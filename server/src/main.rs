use clap::Parser;
use log::info;
use server::{Broker, CredentialStore};
use shared::{BackendDirectory, BrokerPorts, CredentialScheme};
use std::path::PathBuf;

/// Starts the main server: collects room status from every backend, then
/// serves clients until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Credential encoding the member file was produced with: shift or md5
        #[clap(short, long, default_value_t = CredentialScheme::Shift)]
        encoder: CredentialScheme,
        /// Encoded member credentials, one `username, secret` per line
        /// [default: member.txt for shift, member_extra.txt for md5]
        #[clap(short, long)]
        credentials: Option<PathBuf>,
    }

    if std::env::var_os("RUST_LOG").is_none() {
        eprintln!("Hint: set RUST_LOG=info to see the server's progress");
    }
    env_logger::init();

    let args = Args::parse();

    let mut broker = Broker::bind(BrokerPorts::default(), BackendDirectory::default()).await?;
    broker.collect_inventory().await?;

    let path = args
        .credentials
        .unwrap_or_else(|| PathBuf::from(args.encoder.default_credentials_file()));
    let credentials = CredentialStore::load(&path).await?;
    info!(
        "The main server loaded {} members from {}.",
        credentials.len(),
        path.display()
    );

    broker
        .run_until(credentials, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
