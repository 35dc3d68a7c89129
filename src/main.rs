use std::sync::Arc;

use tracing::{error, info};

use teledrive::upload::UploadLimits;
use teledrive::{AppState, Config, Database, TelegramTransport, WebServer};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = teledrive::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        teledrive::logging::init_console_only(&config.logging.level);
    }

    info!("teledrive starting");

    if let Err(e) = run(config).await {
        error!("Fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> teledrive::Result<()> {
    config.validate()?;

    let db = Database::open(&config.database.path).await?;
    let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
    let limits = UploadLimits::from_config(&config.upload);

    info!(
        chunk_size = limits.chunk_size,
        max_blob_size = limits.max_blob_size,
        "Upload limits"
    );

    let state = AppState::new(&db, transport, limits)?;
    let server = WebServer::new(&config.server, state)?;
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    server.run().await?;
    Ok(())
}
