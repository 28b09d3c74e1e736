use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use govdoc::app::directory::{Directory, LocalFsDirectory};
use govdoc::app::{AppState, router};
use govdoc::config::GatewayConfig;
use govdoc::quiz::{AttemptStore, LocalFsAttemptStore};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory for quiz results.
    #[arg(long, default_value = "workspace-app")]
    data_dir: PathBuf,

    /// User directory file (accounts, profiles, roles). Defaults to `<data-dir>/directory.json`.
    #[arg(long)]
    directory: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    govdoc::logging::init()?;

    let args = AppArgs::parse();
    tracing::info!(?args, "starting govdoc-app");

    let directory_path = args
        .directory
        .clone()
        .unwrap_or_else(|| args.data_dir.join("directory.json"));
    let directory: Arc<dyn Directory> = Arc::new(LocalFsDirectory::new(directory_path));
    let attempts: Arc<dyn AttemptStore> = Arc::new(LocalFsAttemptStore::new(&args.data_dir));
    let state = AppState::with_gateway(&GatewayConfig::from_env(), directory, attempts)?;

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
