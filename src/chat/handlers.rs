use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::error::{ChatError, Error};
use crate::AppState;

/// `POST /rooms` — allocate a fresh room code.
pub async fn create_room(state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    let code = state.chat.create_room().await?;
    info!("Room {} created over HTTP", code);
    Ok(HttpResponse::Created().json(json!({ "code": code })))
}

/// `GET /rooms/{code}` — join validation: existence plus current member
/// count. Clients check this before opening the WebSocket.
pub async fn get_room(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let code = path.into_inner();
    let info = state
        .chat
        .room_info(&code)
        .await
        .ok_or(ChatError::RoomNotFound)?;
    Ok(HttpResponse::Ok().json(info))
}

/// `GET /rooms/{code}/history` — messages in broadcast order.
pub async fn room_history(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let code = path.into_inner();
    let messages = state.chat.history(&code).await?;
    Ok(HttpResponse::Ok().json(json!({ "messages": messages })))
}
