//! AI reply integration against a hosted inference API.
//!
//! The provider is an opaque request/response boundary: one POST with the
//! user's message, one generated reply back. Provider-side throttling and
//! cold model starts map to retryable errors instead of opaque 500s.

pub mod handlers;

use reqwest::StatusCode;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;

use crate::error::{AiError, Error};

#[derive(Debug)]
pub struct AiClient {
    http: reqwest::Client,
    endpoint: Url,
    api_token: String,
    model: String,
}

impl AiClient {
    pub fn new(api_url: &str, api_token: &str, model: &str) -> Result<Self, Error> {
        let endpoint = Url::parse(api_url)
            .map_err(|e| Error::Config(format!("Invalid AI endpoint {api_url}: {e}")))?;

        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            api_token: api_token.to_string(),
            model: model.to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Sends the user's message to the inference API and returns the
    /// generated reply.
    pub async fn reply(&self, message: &str) -> Result<String, Error> {
        let url = self
            .endpoint
            .join(&format!("models/{}", self.model))
            .map_err(|e| Error::Config(format!("Invalid model path: {e}")))?;

        let mut request = self.http.post(url).json(&json!({ "inputs": message }));
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!("Inference API answered with status {}", status);

        match status {
            StatusCode::OK => {
                let body: serde_json::Value = response.json().await?;
                body.as_array()
                    .and_then(|results| results.first())
                    .and_then(|result| result.get("generated_text"))
                    .and_then(|text| text.as_str())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        warn!("Inference response missing generated_text: {}", body);
                        Error::Ai(AiError::ResponseError(
                            "missing generated_text".to_string(),
                        ))
                    })
            }
            StatusCode::SERVICE_UNAVAILABLE => Err(Error::Ai(AiError::ModelLoading)),
            StatusCode::TOO_MANY_REQUESTS => Err(Error::Ai(AiError::RateLimited)),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Ai(AiError::RequestFailed(format!(
                    "{status}: {body}"
                ))))
            }
        }
    }
}
