use clap::Parser;
use server::credentials::encode_plaintext;
use shared::CredentialScheme;
use std::path::PathBuf;

/// Encodes a plaintext `username,password` file into the format the main
/// server loads, writing the result to stdout.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Plaintext credentials
        #[clap(default_value = "member_unencrypted.txt")]
        input: PathBuf,
        /// Encoding to apply: shift or md5
        #[clap(short, long, default_value_t = CredentialScheme::Shift)]
        encoder: CredentialScheme,
    }

    env_logger::init();
    let args = Args::parse();

    let contents = tokio::fs::read_to_string(&args.input).await?;
    let encoder = args.encoder.encoder();
    for line in encode_plaintext(&contents, encoder.as_ref()) {
        println!("{}", line);
    }

    Ok(())
}
