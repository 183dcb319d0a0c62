use gitlab_irc_notify::api::build_router;
use gitlab_irc_notify::error::NotifyError;
use gitlab_irc_notify::irc::IrcClient;
use gitlab_irc_notify::logging::{FileLogger, setup_logging};
use gitlab_irc_notify::{AppState, load_config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8084";
const DEFAULT_CONFIG_PATH: &str = "notify_config.toml";

async fn run() -> Result<(), NotifyError> {
    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("NOTIFY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = load_config(&config_path)?;
    info!("Using config at {:?}", config_path);

    let channels = config.routing.all_channels();
    let client = IrcClient::new(config.irc.clone())?;
    let (irc_sender, _session) = client.start(channels).await?;

    let state = Arc::new(AppState::new(&config, Arc::new(irc_sender)));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| NotifyError::ConfigError(format!("Failed to bind {}: {}", bind_address, e)))?;
    info!("Listening on {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let file_logger = match std::env::var("LOG_DIR").ok().map(|dir| {
        FileLogger::from_settings(
            PathBuf::from(dir),
            std::env::var("LOG_MAX_FILES").ok().as_deref(),
            std::env::var("LOG_ROTATION").ok().as_deref(),
        )
    }) {
        Some(Ok(logger)) => Some(logger),
        Some(Err(e)) => {
            eprintln!("Logging setup error: {}", e);
            std::process::exit(1);
        }
        None => None,
    };
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
