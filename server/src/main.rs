use anyhow::Context;
use clap::Parser;
use runtime::{init_logging, spawn_runner, LogHub, MicropsiConfig, Runtime};
use server::{router, AppState};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config.ini")]
    config: PathBuf,
    /// Host to bind, overrides the configuration
    #[arg(long)]
    host: Option<String>,
    /// Port to bind, overrides the configuration
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = MicropsiConfig::load(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    config.apply_process_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let logs = LogHub::default();
    init_logging(&config.log_level, logs.clone()).map_err(|e| anyhow::anyhow!(e))?;
    shared::mkdir(&config.data_directory)?;

    let period = Duration::from_millis(config.runner_timestep_ms);
    let addr = (config.host.clone(), config.port);
    let runtime = Arc::new(Mutex::new(Runtime::new(config, logs.clone())));
    spawn_runner(runtime.clone(), period);

    let app = router(AppState::new(runtime, logs));
    let listener = tokio::net::TcpListener::bind((addr.0.as_str(), addr.1))
        .await
        .with_context(|| format!("binding {}:{}", addr.0, addr.1))?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
