use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::handlers::bearer_token;
use crate::error::{AuthError, Error};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AiChatRequest {
    pub message: String,
}

/// `POST /ai/chat` — forward a message to the inference API and return the
/// generated reply. Requires a logged-in user; inference quota is metered
/// per user through the rate limiter.
pub async fn ai_chat(
    req: HttpRequest,
    body: web::Json<AiChatRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    if body.message.is_empty() {
        return Err(Error::Validation("No message provided".to_string()));
    }

    let ai = state
        .ai
        .as_ref()
        .ok_or_else(|| Error::Validation("AI replies are disabled".to_string()))?;

    let token = bearer_token(&req).ok_or(Error::Auth(AuthError::Unauthorized))?;
    let user = state.auth_service.validate_token(token).await?;

    if !state
        .rate_limiter
        .check_rate_limit(user.id, &user.rate_limit_tier)
        .await
    {
        return Err(Error::Auth(AuthError::RateLimited));
    }

    info!("AI reply requested by {}", user.username);
    let reply = ai.reply(&body.message).await?;
    Ok(HttpResponse::Ok().json(json!({ "reply": reply })))
}
