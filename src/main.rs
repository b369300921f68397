use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use checkpoint_engine::admin_api::routes::AppState;
use checkpoint_engine::admin_api::server::AdmissionServer;
use checkpoint_engine::config::settings::Settings;
use checkpoint_engine::Engine;

/// Parse the `--config` CLI flag. Defaults to `/opt/checkpoint/config/checkpoint.toml`.
fn parse_config_path() -> String {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = String::from("/opt/checkpoint/config/checkpoint.toml");

    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" {
            if let Some(path) = args.get(i + 1) {
                config_path = path.clone();
            }
            i += 2;
        } else {
            i += 1;
        }
    }

    config_path
}

fn init_tracing(log_file: &str) {
    let log_dir = std::path::Path::new(log_file).parent().and_then(|p| p.to_str()).unwrap_or(".");
    let _ = std::fs::create_dir_all(log_dir);

    let file = std::fs::OpenOptions::new().create(true).append(true).open(log_file);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,checkpoint_engine=debug"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(true);

    match file {
        Ok(f) => {
            let file_layer = fmt::layer().with_writer(f).with_ansi(false).with_target(true);
            tracing_subscriber::registry().with(filter).with(stdout_layer).with(file_layer).init();
        }
        Err(_) => {
            tracing_subscriber::registry().with(filter).with(stdout_layer).init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ---------------------------------------------------------------
    // 1. Configuration
    // ---------------------------------------------------------------
    let config_path = parse_config_path();
    let settings = Settings::load(&config_path).unwrap_or_else(|e| {
        eprintln!("warning: {e}, falling back to defaults");
        Settings::default()
    });

    // ---------------------------------------------------------------
    // 2. Logging
    // ---------------------------------------------------------------
    init_tracing(&settings.logging.file);
    info!("Starting admission & reputation engine");
    info!("Config loaded from {}", config_path);

    // ---------------------------------------------------------------
    // 3. Store + pipelines (process-wide init sequence, spec.md §5)
    // ---------------------------------------------------------------
    let bind = settings.server.bind.clone();
    let api_key = settings.admin_api.api_key.clone();

    let engine = Arc::new(Engine::new(settings).map_err(|e| {
        error!(error = %e, "failed to initialize engine");
        e
    })?);

    info!("Store opened and schema migrations applied");

    // ---------------------------------------------------------------
    // 4. Background tasks: Tor-list updater + retention sweep
    // ---------------------------------------------------------------
    let background_handles = Arc::clone(&engine).spawn_background_tasks();
    info!("Tor-list updater and retention sweep started");

    // ---------------------------------------------------------------
    // 5. HTTP façade
    // ---------------------------------------------------------------
    let state = AppState {
        engine: Arc::clone(&engine),
        api_key,
    };
    let server = AdmissionServer::new(state, bind);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("admission server error: {}", e);
        }
    });

    info!("Admission engine is running. Press Ctrl+C to shut down.");

    // ---------------------------------------------------------------
    // 6. Shutdown: stop the updater (in-flight fetch finishes on its
    // own), then let the store drop.
    // ---------------------------------------------------------------
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    server_handle.abort();
    for handle in background_handles {
        handle.abort();
    }

    info!("Shut down gracefully");
    Ok(())
}
