use clap::Parser;
use client::messages::{describe_auth, describe_availability, describe_reservation};
use client::{Choice, ClientSession, Prompter};
use log::info;
use shared::{CredentialScheme, RequestKind, BROKER_CLIENT_PORT};
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Main server's client-facing TCP port
    #[arg(short = 'p', long, default_value_t = BROKER_CLIENT_PORT)]
    port: u16,

    /// Credential encoding the main server expects: shift or md5
    #[arg(short = 'e', long, default_value_t = CredentialScheme::Shift)]
    encoder: CredentialScheme,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let mut prompts = Prompter::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout());

    let mut session = ClientSession::connect_with_encoder(args.port, args.encoder.encoder()).await?;
    prompts.say("Client is up and running.").await?;
    info!("Connected to the main server on port {}", args.port);

    while session.is_open() {
        let Some(credentials) = prompts.credentials().await? else {
            return Ok(());
        };
        let outcome = session
            .authenticate(&credentials.username, credentials.password.as_deref())
            .await?;
        prompts
            .say(&describe_auth(&outcome, &credentials.username))
            .await?;

        if outcome.is_authenticated() {
            break;
        }
    }

    while session.is_open() {
        let Some(room) = prompts.room().await? else {
            break;
        };
        let Some(choice) = prompts.request_kind().await? else {
            break;
        };

        match choice {
            Choice::Request(RequestKind::Availability) => {
                let outcome = session.check_availability(&room).await?;
                prompts.say(&describe_availability(&outcome)).await?;
                prompts.say("").await?;
            }
            Choice::Request(RequestKind::Reservation) => {
                let outcome = session.reserve(&room).await?;
                prompts.say(&describe_reservation(&outcome, &room)).await?;
                prompts.say("").await?;
            }
            Choice::Invalid(_) => prompts.say("Invalid request entered.\n").await?,
        }

        if session.is_open() {
            prompts.say("-----Start a new request-----").await?;
        }
    }

    Ok(())
}
