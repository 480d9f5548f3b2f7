mod backend;
mod events;
mod problem;
mod router;
mod sync;
mod telemetry;

use std::net::SocketAddr;

use jobtrack_api::JobApplicationsClient;
use jobtrack_core::demo::demo_applications;
use jobtrack_core::Board;
use jobtrack_util::{load_env_file, AppConfig, BoardSeed};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.api_timeout)
        .build()?;
    let mut client = JobApplicationsClient::new(config.api_base_url.clone(), http);
    if let Some(token) = &config.api_token {
        client = client.with_token(token.clone());
    }

    let board = match config.board_seed {
        BoardSeed::Demo => Board::from_applications(demo_applications()?),
        BoardSeed::Fetch => Board::new(),
    };

    let events = events::BoardEvents::new();
    let (service, worker) = sync::BoardService::new(client, events.clone(), board);
    worker.spawn();

    if config.board_seed == BoardSeed::Fetch {
        if let Err(err) = service.refresh().await {
            warn!(stage = "app", error = %err, "initial board refresh could not be queued");
        }
    }

    let state = router::AppState::new(metrics, service, events, config.sse_heartbeat);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        api = %config.api_base_url,
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
