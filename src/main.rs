use std::path::Path;
use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use stetholink::api::{build_router, ApiContext, ApiServer};
use stetholink::bot::{spawn_pruner, telegram, BotHandler, WhatsAppBridge};
use stetholink::config::Config;
use stetholink::simulation::{spawn_reaper, CaseCatalog, InMemorySessionStore, SessionStore};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "stetholink.json".to_string());

    let config = if Path::new(&config_path).exists() {
        match Config::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {}: {e}", log_dir.display());
        std::process::exit(1);
    }
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("stetholink.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file: {e}");
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("🚀 Starting stetholink...");
    match &config.config_path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config at {config_path}, using defaults"),
    }

    let catalog = match &config.fixtures_path {
        Some(path) => match CaseCatalog::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Failed to load case fixtures: {e}");
                std::process::exit(1);
            }
        },
        None => CaseCatalog::builtin(),
    };
    info!("Loaded {} case(s)", catalog.len());

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new(Arc::new(catalog)));

    let reaper = config
        .session_ttl
        .map(|ttl| spawn_reaper(store.clone(), ttl, config.reap_interval));
    if reaper.is_none() {
        info!("Session eviction disabled");
    }

    let handler = Arc::new(BotHandler::new(store.clone()));
    let pruner = reaper
        .is_some()
        .then(|| spawn_pruner(handler.clone(), config.reap_interval));

    let telegram_task = match &config.telegram_bot_token {
        Some(token) => {
            let bot = Bot::new(token);
            Some(tokio::spawn(telegram::run(bot, handler.clone())))
        }
        None => {
            info!("Telegram bot disabled (no telegram_bot_token)");
            None
        }
    };

    let whatsapp = match &config.whatsapp {
        Some(wa) => {
            info!("WhatsApp webhook enabled at /webhook/whatsapp");
            Some(Arc::new(WhatsAppBridge::new(wa, handler.clone())))
        }
        None => {
            info!("WhatsApp webhook disabled");
            None
        }
    };

    let app = build_router(ApiContext::new(store.clone()), whatsapp, config.static_dir.as_deref());
    let mut server = match ApiServer::start(app, config.bind_addr).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    info!("Ready on http://{}", server.addr);

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {e}");
    }
    info!("Shutting down...");

    server.shutdown();
    server.wait().await;
    for task in reaper.into_iter().chain(pruner) {
        task.abort();
    }
    if let Some(task) = telegram_task
        && let Err(e) = task.await
    {
        warn!("Telegram task ended abnormally: {e}");
    }
    info!("👋 Stopped with {} session(s) in memory", store.session_count());
}
