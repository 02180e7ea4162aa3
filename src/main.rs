use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use chatterbox_server::{
    ai, auth, chat, health_check, uploads, AppState, ChatServer, DbOperations, Error, Settings,
};

#[actix_web::main]
async fn main() -> chatterbox_server::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Internal(format!("Failed to set tracing subscriber: {}", e)))?;

    let config = Settings::new()?;
    info!("Starting server in {} mode", config.environment);

    let state = AppState::new(config.clone()).await?;

    sqlx::migrate!("./migrations")
        .run(state.db_pool.as_ref())
        .await
        .map_err(|e| {
            Error::Database(chatterbox_server::error::DatabaseError::QueryError(
                e.to_string(),
            ))
        })?;

    // Chat runs over a dedicated WebSocket listener, next to the HTTP API.
    let ws_addr = format!("{}:{}", config.websocket.host, config.websocket.port);
    let ws_listener = tokio::net::TcpListener::bind(&ws_addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", ws_addr, e)))?;
    info!("Chat transport listening on ws://{}", ws_addr);

    let chat_server = Arc::new(ChatServer::new(state.chat.clone()));
    tokio::spawn(chat_server.run(ws_listener));

    // Background maintenance: expired sessions and rate-limit windows.
    let maintenance = state.clone();
    tokio::spawn(async move {
        let db = DbOperations::new(maintenance.db_pool.clone());
        loop {
            tokio::time::sleep(Duration::from_secs(60)).await;
            maintenance.rate_limiter.cleanup().await;
            match db.delete_expired_sessions().await {
                Ok(n) if n > 0 => info!("Removed {} expired sessions", n),
                Ok(_) => {}
                Err(e) => warn!("Session cleanup failed: {}", e),
            }
        }
    });

    let http_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&http_addr)
        .map_err(|e| Error::Internal(format!("Failed to bind {}: {}", http_addr, e)))?;
    info!("HTTP API listening on http://{}", http_addr);

    let workers = config.server.workers as usize;
    let state = web::Data::new(state);

    HttpServer::new(move || {
        let cors = if config.cors.enabled {
            let cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                .allow_any_header()
                .max_age(config.cors.max_age as usize);
            if config.cors.allow_any_origin {
                cors.allow_any_origin()
            } else {
                cors.allowed_origin(&format!("http://{}:{}", config.server.host, config.server.port))
            }
        } else {
            Cors::default()
        };

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(config.uploads.max_bytes))
            .route("/health", web::get().to(health_check))
            .route("/auth/register", web::post().to(auth::handlers::register))
            .route("/auth/login", web::post().to(auth::handlers::login))
            .route("/auth/logout", web::post().to(auth::handlers::logout))
            .route("/rooms", web::post().to(chat::handlers::create_room))
            .route("/rooms/{code}", web::get().to(chat::handlers::get_room))
            .route(
                "/rooms/{code}/history",
                web::get().to(chat::handlers::room_history),
            )
            .route("/upload", web::post().to(uploads::handlers::upload_file))
            .route(
                "/uploads/{filename}",
                web::get().to(uploads::handlers::serve_file),
            )
            .route("/ai/chat", web::post().to(ai::handlers::ai_chat))
    })
    .listen(listener)
    .map_err(|e| Error::Internal(format!("Failed to start server: {}", e)))?
    .workers(workers)
    .run()
    .await
    .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
