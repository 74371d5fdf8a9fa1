//! HTTP server binary for pagetutor.
//!
//! A thin shim over the library crate that maps CLI flags to `AppConfig`,
//! initialises logging and serves the axum router.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pagetutor::server::{serve, AppState};
use pagetutor::AppConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pagetutor-server",
    about = "Upload a PDF page and stream an LLM tutor's explanation",
    version
)]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PAGETUTOR_ADDR", default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Data directory for persisted state (conversation history).
    #[arg(long, env = "PAGETUTOR_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Frontend origin allowed by CORS, e.g. http://localhost:5173.
    #[arg(long, env = "PAGETUTOR_CORS_ORIGIN")]
    cors_origin: Option<String>,

    /// Maximum tokens per model call.
    #[arg(long, env = "PAGETUTOR_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut builder = AppConfig::builder().max_tokens(args.max_tokens);
    if let Some(dir) = args.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(origin) = args.cors_origin {
        builder = builder.cors_origin(origin);
    }
    let config = builder.build()?;

    let state = Arc::new(AppState::new(config));
    serve(state, args.addr).await?;

    Ok(())
}
