//! Gateway CLI
//!
//! Sends one request through the `ModKit` request gateway and prints the
//! resolved JSON.
//!
//! # Usage
//!
//! ```bash
//! # GET against the configured backend
//! gateway-cli --config gateway.yaml h5/goods/list
//!
//! # Authenticated POST with a stored token
//! gateway-cli -X post --auth --token "$TOKEN" h5/cart/add --data '{"skuId": 7}'
//!
//! # Override config from the environment
//! MODKIT_GATEWAY__BASE_URL=https://shop.example.com/ gateway-cli h5/index/banner
//! ```

// CLI tools are expected to print to stdout/stderr
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use modkit_gateway::{
    BearerToken, Gateway, GatewayConfig, MemoryCredentialStore, RequestConfig, ResponseShape,
    StaticPlatform, TracingUi,
};
use tracing_subscriber::EnvFilter;

/// Send one request through the gateway
#[derive(Parser, Debug)]
#[command(name = "gateway-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method
    #[arg(short = 'X', long, value_enum, default_value_t = HttpMethod::Get)]
    method: HttpMethod,

    /// Request URL, relative to the configured API path
    url: String,

    /// JSON request body
    #[arg(short, long)]
    data: Option<String>,

    /// Require login before sending
    #[arg(long)]
    auth: bool,

    /// Persisted session token to start with
    #[arg(long)]
    token: Option<String>,

    /// Platform name sent in the `platform` header
    #[arg(long, default_value = "H5")]
    platform: String,

    /// Route reported as the current page; landing routes suppress the
    /// login prompt on an expired session
    #[arg(long)]
    route: Option<String>,

    /// Print the whole response envelope instead of `data`
    #[arg(long)]
    envelope: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = GatewayConfig::load(cli.config.as_deref())?;
    if cli.envelope {
        config.response_shape = ResponseShape::Envelope;
    }

    if cli.auth && cli.token.is_none() {
        tracing::warn!(
            "--auth without --token: the request waits for a login that this CLI cannot perform"
        );
    }
    let store = match cli.token {
        Some(token) => MemoryCredentialStore::restored(BearerToken::new(token)),
        None => MemoryCredentialStore::new(),
    };

    let ui = TracingUi::new();
    ui.set_route(cli.route);

    let gateway = Gateway::builder(config)
        .credential_store(Arc::new(store))
        .ui(Arc::new(ui))
        .platform(Arc::new(StaticPlatform::new(cli.platform)))
        .build()?;

    let mut request = match cli.method {
        HttpMethod::Get => RequestConfig::get(cli.url),
        HttpMethod::Post => RequestConfig::post(cli.url),
        HttpMethod::Put => RequestConfig::put(cli.url),
        HttpMethod::Delete => RequestConfig::delete(cli.url),
    };
    if let Some(data) = cli.data {
        let body: serde_json::Value =
            serde_json::from_str(&data).context("--data is not valid JSON")?;
        request = request.json(body);
    }
    if cli.auth {
        request = request.auth();
    }

    let value = gateway.request(request).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
