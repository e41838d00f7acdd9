use opportunity_gateway::{
    config::{Config, LogFormat},
    repository::Repositories,
    routes,
    services::{email_client, scheduler::start_digest_scheduler},
    AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let repositories = Repositories::from_config(&config).await?;
    let mailer = email_client::from_config(&config.mail)?;
    let addr: SocketAddr = config.server_address.parse()?;
    let digest_cron = config.digest_cron.clone();

    let app_state = AppState::new(config, repositories, mailer);

    let mut scheduler = start_digest_scheduler(&digest_cron, app_state.dispatcher.clone()).await?;

    let app = routes::router(app_state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    scheduler.shutdown().await?;
    Ok(())
}
