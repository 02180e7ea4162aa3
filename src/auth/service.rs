use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::db::models::{User, UserSession};
use crate::db::operations::DbOperations;
use crate::error::{AuthError, DatabaseError, Error};

const SALT_SIZE: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub exp: i64,    // Expiration time
    pub iat: i64,    // Issued at
}

pub struct AuthService {
    db: DbOperations,
    jwt_secret: String,
    token_expiry_hours: i64,
}

impl AuthService {
    pub fn new(db: DbOperations, jwt_secret: String, token_expiry_hours: i64) -> Self {
        Self {
            db,
            jwt_secret,
            token_expiry_hours,
        }
    }

    /// Creates an account. A taken username surfaces as a validation error,
    /// matching the signup form's "name already registered" message.
    pub async fn register(&self, username: &str, password: &str) -> Result<User, Error> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::Validation("All fields are required".to_string()));
        }

        let user = User::new(username.to_string(), hash_password(password));
        match self.db.create_user(&user).await {
            Ok(created) => {
                info!("Registered user {}", created.username);
                Ok(created)
            }
            Err(Error::Database(DatabaseError::Duplicate)) => {
                Err(Error::Validation("Name already registered".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Verifies the password and issues a JWT backed by a DB session row.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<String, Error> {
        let user = self
            .db
            .get_user_by_username(username)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidCredentials))?;

        if !user.is_active || !verify_password(password, &user.password_hash) {
            return Err(Error::Auth(AuthError::InvalidCredentials));
        }

        let token = self.generate_token(&user.id.to_string())?;
        let session = UserSession::new(user.id, token.clone(), self.token_expiry_hours);
        self.db.create_session(&session).await?;
        self.db.update_last_login(user.id).await?;

        info!("User {} logged in", user.username);
        Ok(token)
    }

    pub async fn validate_token(&self, token: &str) -> Result<User, Error> {
        // First check if the session exists and is not expired
        let session = self
            .db
            .get_session_by_token(token)
            .await?
            .ok_or(Error::Auth(AuthError::InvalidToken))?;

        if session.is_expired() {
            return Err(Error::Auth(AuthError::TokenExpired));
        }

        let claims = self.decode_token(token)?;

        let user = self
            .db
            .get_user_by_id(
                Uuid::parse_str(&claims.sub)
                    .map_err(|_| Error::Auth(AuthError::InvalidToken))?,
            )
            .await?
            .ok_or(Error::Auth(AuthError::InvalidToken))?;

        self.db.update_session_activity(token).await?;

        Ok(user)
    }

    pub async fn invalidate_token(&self, token: &str) -> Result<(), Error> {
        self.db.delete_session(token).await?;
        Ok(())
    }

    fn generate_token(&self, user_id: &str) -> Result<String, Error> {
        let now = Utc::now();
        let exp = (now + Duration::hours(self.token_expiry_hours)).timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    fn decode_token(&self, token: &str) -> Result<Claims, Error> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}

/// Salted SHA-256, stored as `base64(salt)$base64(digest)`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);

    let digest = salted_digest(&salt, password);
    format!("{}${}", BASE64.encode(salt), BASE64.encode(digest))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, digest_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(digest)) = (BASE64.decode(salt_b64), BASE64.decode(digest_b64)) else {
        return false;
    };

    salted_digest(&salt, password).as_slice() == digest.as_slice()
}

fn salted_digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}
