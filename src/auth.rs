use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    config::AuthConfig,
    error::{ImportError, Result},
};

/// The authenticated caller. `id` doubles as the account id.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity>;
}

/// Resolves tokens against the hosted platform's `GET /user` endpoint.
pub struct HttpIdentityVerifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpIdentityVerifier {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, token: &str) -> Result<Identity> {
        let mut request = self
            .client
            .get(format!("{}/user", self.base_url))
            .bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("apikey", key);
        }

        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => {
                let identity: Identity = response.json().await?;
                debug!(account_id = %identity.id, "Resolved caller identity");
                Ok(identity)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ImportError::Unauthorized("Invalid or expired token".to_string()))
            }
            status => {
                warn!(%status, "Identity provider returned unexpected status");
                Err(ImportError::Other(anyhow::anyhow!(
                    "Identity provider returned {}",
                    status
                )))
            }
        }
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_bearer_token(header: &str) -> Result<&str> {
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| ImportError::Unauthorized("Invalid authorization header format".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ImportError::Unauthorized(
            "Authorization header must use the Bearer scheme".to_string(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ImportError::Unauthorized("Missing bearer token".to_string()));
    }
    Ok(token)
}
