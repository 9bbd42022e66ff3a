use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatdb::{create_router, create_state};
use chatdb_configuration::environment::ProcessEnvironment;
use chatdb_configuration::{make_runtime_configuration, parse_configuration};

#[derive(Parser)]
struct ServerOptions {
    /// Directory holding configuration.json.
    #[arg(long, env = "CHATDB_CONFIGURATION", value_name = "DIRECTORY", default_value = ".")]
    configuration: PathBuf,
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Emit logs as JSON lines.
    #[arg(long, env = "CHATDB_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = ServerOptions::parse();
    init_tracing(options.log_json);

    let parsed = parse_configuration(&options.configuration)
        .await
        .context("reading the configuration")?;
    let configuration = make_runtime_configuration(parsed, &ProcessEnvironment)
        .context("resolving the configuration")?;
    tracing::info!(?configuration, "configuration loaded");

    let model = chatdb::state::create_model(&configuration.model)?;
    let state = create_state(configuration, model)?;
    let router = create_router(state);

    let address: SocketAddr = format!("{}:{}", options.host, options.port)
        .parse()
        .context("parsing the listen address")?;
    tracing::info!(%address, "starting server");

    axum::Server::bind(&address)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
