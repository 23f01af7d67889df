use clap::Parser;
use tinylink_gateway::cli::{Cli, LogFormatArg};
use tinylink_gateway::{App, Services};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    info!(
        listen_addr = %cli.listen_addr,
        storage_backend = %cli.storage,
        cache_backend = %cli.cache,
        "starting gateway"
    );

    let services = Services::build(&cli).await?;
    let listener = tokio::net::TcpListener::bind(cli.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    axum::serve(listener, App::router(services.state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(worker) = services.cache_worker {
        info!("draining cache writes");
        worker.shutdown().await;
    }
    info!("gateway stopped");
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    match cli.log_format {
        LogFormatArg::Json => fmt().json().with_env_filter(filter).init(),
        LogFormatArg::Pretty => fmt().with_env_filter(filter).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
