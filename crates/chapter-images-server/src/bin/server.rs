//! Chapter Images Server
//!
//! Serves bucket listings, image bytes and resolved URLs for the chapter site

use anyhow::{bail, Context};
use chapter_images::{DeployMode, ImageLoader};
use chapter_images_server::{connect, handle, AppState, ProviderKind, ServerConfig};
use clap::Parser;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "chapter-images-server")]
#[command(about = "Image listing and URL resolution over R2, B2 or Google Drive")]
struct Args {
    /// TOML config file with [storage], [provider] and [listen] sections
    #[arg(short = 'c', long, env = "CHAPTER_IMAGES_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides [listen] host)
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port number (overrides [listen] port)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Storage provider (r2, b2, s3, drive, memory)
    #[arg(long)]
    provider: Option<String>,

    /// Deployment mode (production, development)
    #[arg(long)]
    mode: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config: {:?}", path);
            ServerConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ServerConfig::default(),
    };

    config
        .storage
        .apply_env()
        .context("applying CHAPTER_IMAGES_* environment")?;

    if let Some(kind) = &args.provider {
        config.provider.kind = match ProviderKind::parse(kind) {
            Some(kind) => kind,
            None => bail!("Invalid provider '{}'. Valid options: r2, b2, s3, drive, memory", kind),
        };
    }
    if let Some(mode) = &args.mode {
        config.storage.mode = match DeployMode::parse(mode) {
            Some(mode) => mode,
            None => bail!("Invalid mode '{}'. Valid options: production, development", mode),
        };
    }
    if let Some(host) = args.host {
        config.listen.host = host;
    }
    if let Some(port) = args.port {
        config.listen.port = port;
    }

    for problem in config.storage.validate() {
        warn!("config: {}", problem);
    }

    info!(
        "Provider: {}, bucket: {:?}, mode: {:?}",
        config.provider.kind.as_str(),
        config.storage.bucket_name,
        config.storage.mode
    );

    let provider = connect(&config.provider, &config.storage)
        .await
        .context("connecting storage provider")?;
    let loader = ImageLoader::new(&config.storage, provider.clone());
    let state = Arc::new(AppState::new(loader, provider));

    let addr: SocketAddr = format!("{}:{}", config.listen.host, config.listen.port)
        .parse()
        .context("parsing listen address")?;

    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    let local_addr = listener.local_addr()?;
    let http_server = ConnBuilder::new(TokioExecutor::new());

    info!("HTTP server running at http://{}", local_addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((socket, _)) => {
                        let state = state.clone();
                        let http_server = http_server.clone();
                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle(state.clone(), req));
                            if let Err(e) = http_server.serve_connection(TokioIo::new(socket), service).await {
                                warn!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    info!("Server stopped");
    Ok(())
}
