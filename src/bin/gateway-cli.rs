use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use admission_gateway::auth::TokenValidator;
use admission_gateway::config::{load_config, AuthConfig};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the admission gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mint a bearer token the gateway will accept
    Token {
        #[arg(short, long)]
        subject: String,

        /// Gateway config to take algorithm, issuer and lifetime from
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Lifetime in seconds (default: auth.token_ttl_secs)
        #[arg(short, long)]
        ttl: Option<u64>,

        #[arg(long, env = "GATEWAY_JWT_SECRET")]
        secret: Option<String>,
    },
    /// Send requests and print a status histogram
    Probe {
        #[arg(short, long, default_value = "http://localhost:8000/health")]
        url: String,

        #[arg(short, long, default_value_t = 10)]
        count: u32,

        /// Bearer token to send with every request
        #[arg(short, long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Token {
            subject,
            config,
            ttl,
            secret,
        } => {
            let mut auth = match config {
                Some(path) => load_config(&path)?.auth,
                None => AuthConfig::default(),
            };
            if let Some(secret) = secret {
                auth.secret = secret;
            }
            if auth.secret.is_empty() {
                return Err("no signing secret: pass --secret, set GATEWAY_JWT_SECRET, or use --config".into());
            }

            let validator = TokenValidator::from_config(&auth)?;
            let token = match ttl {
                Some(secs) => validator.issue(&subject, Duration::from_secs(secs))?,
                None => validator.issue_default(&subject)?,
            };
            println!("{token}");
        }
        Commands::Probe { url, count, token } => {
            let mut headers = HeaderMap::new();
            if let Some(token) = token {
                headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
            }
            let client = reqwest::Client::builder().default_headers(headers).build()?;
            probe(&client, &url, count).await;
        }
    }

    Ok(())
}

async fn probe(client: &reqwest::Client, url: &str, count: u32) {
    let started = Instant::now();
    let mut histogram: BTreeMap<String, u32> = BTreeMap::new();
    let mut last_remaining = None;

    for _ in 0..count {
        let label = match client.get(url).send().await {
            Ok(res) => {
                if let Some(remaining) = res.headers().get("x-ratelimit-remaining") {
                    last_remaining = remaining.to_str().ok().map(str::to_string);
                }
                res.status().as_u16().to_string()
            }
            Err(e) if e.is_timeout() => "timeout".to_string(),
            Err(e) if e.is_connect() => "connect error".to_string(),
            Err(_) => "error".to_string(),
        };
        *histogram.entry(label).or_default() += 1;
    }

    println!("{count} requests to {url} in {:.2?}", started.elapsed());
    println!("{:<15} {:>6}", "STATUS", "COUNT");
    for (status, n) in &histogram {
        println!("{status:<15} {n:>6}");
    }
    if let Some(remaining) = last_remaining {
        println!("last x-ratelimit-remaining: {remaining}");
    }
}
