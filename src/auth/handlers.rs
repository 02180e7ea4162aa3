use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AuthError, Error};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    info!("Received login request for user: {}", req.username);
    match state
        .auth_service
        .authenticate(&req.username, &req.password)
        .await
    {
        Ok(token) => {
            info!("Login successful for user: {}", req.username);
            Ok(HttpResponse::Ok().json(AuthResponse { token }))
        }
        Err(e) => {
            error!("Login failed for user: {}: {}", req.username, e);
            Err(e)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    info!("Received registration request for user: {}", req.username);

    if let Err(e) = state
        .auth_service
        .register(&req.username, &req.password)
        .await
    {
        error!("Registration failed for user: {}: {}", req.username, e);
        return Err(e);
    }

    // Log in immediately after successful registration.
    match state
        .auth_service
        .authenticate(&req.username, &req.password)
        .await
    {
        Ok(token) => {
            info!("Post-registration login successful for user: {}", req.username);
            Ok(HttpResponse::Created().json(AuthResponse { token }))
        }
        Err(e) => {
            error!(
                "Post-registration login failed unexpectedly for user: {}: {}",
                req.username, e
            );
            Err(e)
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let token = bearer_token(&req)
        .ok_or_else(|| Error::Auth(AuthError::Unauthorized))?;

    state.auth_service.invalidate_token(token).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Successfully logged out"
    })))
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}
