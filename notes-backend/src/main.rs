use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod config;
mod controllers;
mod gateway;
mod notes;
mod summary;

use config::Config;
use gateway::{DisconnectReason, NoteEventBroadcaster};
use notes::{NoteService, NoteStore};

pub struct AppState {
    pub config: Config,
    pub notes: Arc<NoteService>,
    /// Live `/ws` subscribers; shared with `notes` for fan-out.
    pub broadcaster: Arc<NoteEventBroadcaster>,
    /// Server start time for uptime logging
    pub started_at: std::time::Instant,
}

impl AppState {
    /// Wire the store, summarizer and broadcaster together from settings.
    pub fn new(config: Config) -> Self {
        let broadcaster = Arc::new(NoteEventBroadcaster::new(config.ws_delivery_timeout));
        let summarizer = summary::build_summarizer(&config);
        let notes = Arc::new(NoteService::new(
            NoteStore::new(),
            summarizer,
            Arc::clone(&broadcaster),
        ));

        Self {
            config,
            notes,
            broadcaster,
            started_at: std::time::Instant::now(),
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    log::info!("Smart Notes API v{}", controllers::health::VERSION);

    let state = web::Data::new(AppState::new(Config::from_env()));
    let bind_addr = state.config.bind_addr();

    log::info!("Listening on http://{}:{}", bind_addr.0, bind_addr.1);

    let app_state = state.clone();
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config_routes)
            .configure(controllers::notes::config)
            // WebSocket push channel (same port as HTTP)
            .route("/ws", web::get().to(gateway::ws::ws_handler))
    })
    .bind(bind_addr)?
    .run();

    let server_handle = server.handle();

    // Spawn Ctrl+C handler
    let shutdown_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        log::info!(
            "Received Ctrl+C, shutting down ({} notes, {} live subscribers, up {}s)...",
            shutdown_state.notes.store().len(),
            shutdown_state.broadcaster.subscriber_count(),
            shutdown_state.started_at.elapsed().as_secs()
        );

        let closed = shutdown_state
            .broadcaster
            .disconnect_all(DisconnectReason::ShuttingDown)
            .await;
        log::info!("Closed {} WebSocket connections", closed);

        log::info!("Stopping HTTP server...");
        let server_stop = server_handle.stop(true);
        if tokio::time::timeout(std::time::Duration::from_secs(5), server_stop).await.is_err() {
            log::warn!("Timeout waiting for HTTP server to stop, forcing exit...");
        }

        log::info!("Shutdown complete");
    });

    server.await
}
