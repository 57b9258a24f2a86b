use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use commons_http::config::{load_config, CommonsConfig};
use commons_http::negotiation::{self, should_compress, SERVER_ENCODINGS};
use commons_http::CachedHttpClient;

#[derive(Parser)]
#[command(name = "commons-cli")]
#[command(about = "Inspect content negotiation and issue cached requests", long_about = None)]
struct Cli {
    /// TOML config used to build the client.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// GET a URL through the cached, retrying client
    Get {
        url: String,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
    /// Select a content type for an Accept header
    Negotiate {
        /// Accept header value
        accept: String,
        /// Server candidates, in preference order
        #[arg(required = true)]
        candidates: Vec<String>,
    },
    /// Select a content coding and decide on compression
    Encoding {
        /// Accept-Encoding header value
        accept_encoding: String,
        /// Payload size in bytes
        #[arg(short, long, default_value_t = 4096)]
        size: usize,
        /// Compression threshold in bytes
        #[arg(short, long, default_value_t = negotiation::DEFAULT_MIN_COMPRESS_SIZE)]
        min_size: usize,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get { url, params } => {
            let config = match &cli.config {
                Some(path) => load_config(path)?,
                None => CommonsConfig::default(),
            };
            let client = CachedHttpClient::from_config(&config)?;
            let response = client.get(&url, params).await?;

            eprintln!("HTTP {} ({} attempt(s))", response.status, response.attempts);
            match response.json::<Value>() {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(_) => println!("{}", response.text()),
            }
        }
        Commands::Negotiate { accept, candidates } => {
            let preferences = negotiation::parse(&accept);
            let selected = negotiation::select(&preferences, candidates.as_slice());
            let report = json!({
                "preferences": preferences.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
                "selected": selected,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Encoding {
            accept_encoding,
            size,
            min_size,
        } => {
            let selected = negotiation::select_encoding_header(&accept_encoding, &SERVER_ENCODINGS);
            let compress = should_compress(selected.as_deref(), size, min_size);
            let report = json!({
                "offered": SERVER_ENCODINGS,
                "selected": selected,
                "compress": compress,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
