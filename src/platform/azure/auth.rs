// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 trainflow contributors

//! Service principal authentication
//!
//! OAuth2 client-credentials flow against the tenant's authority. The token
//! is cached until shortly before it expires.

use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::config::{Secret, ServicePrincipal};
use crate::errors::{TrainflowError, TrainflowResult};

/// Refresh this long before the reported expiry
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    value: Secret,
    refresh_at: Instant,
}

/// Bearer token source for one service principal
pub struct ServicePrincipalAuth {
    token_url: String,
    scope: String,
    tenant_id: String,
    principal: ServicePrincipal,
    cached: Mutex<Option<CachedToken>>,
}

impl ServicePrincipalAuth {
    pub fn new(
        authority_host: &str,
        management_endpoint: &str,
        tenant_id: &str,
        principal: ServicePrincipal,
    ) -> Self {
        Self {
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                tenant_id
            ),
            scope: format!("{}/.default", management_endpoint.trim_end_matches('/')),
            tenant_id: tenant_id.to_string(),
            principal,
            cached: Mutex::new(None),
        }
    }

    /// Current access token, requesting a new one when needed
    pub async fn token(&self, http: &Client) -> TrainflowResult<Secret> {
        let mut cached = self.cached.lock().await;

        if let Some(ref token) = *cached {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.request_token(http).await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self, http: &Client) -> TrainflowResult<CachedToken> {
        tracing::debug!(tenant = %self.tenant_id, app_id = %self.principal.app_id, "requesting access token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.principal.app_id.as_str()),
            ("client_secret", self.principal.secret.expose()),
            ("scope", self.scope.as_str()),
        ];

        let response = http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.auth_error(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("token endpoint returned {}", status));
            return Err(self.auth_error(message));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| self.auth_error(format!("malformed token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        Ok(CachedToken {
            value: Secret::new(token.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(EXPIRY_MARGIN),
        })
    }

    fn auth_error(&self, message: String) -> TrainflowError {
        TrainflowError::Authentication {
            tenant: self.tenant_id.clone(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn principal() -> ServicePrincipal {
        ServicePrincipal {
            app_id: "app-1".into(),
            secret: Secret::new("hunter2"),
        }
    }

    #[tokio::test]
    async fn test_token_is_requested_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("client_id=app-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = ServicePrincipalAuth::new(&server.uri(), &server.uri(), "tenant-1", principal());
        let http = Client::new();

        assert_eq!(auth.token(&http).await.unwrap().expose(), "tok-123");
        assert_eq!(auth.token(&http).await.unwrap().expose(), "tok-123");
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tenant-1/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided."
            })))
            .mount(&server)
            .await;

        let auth = ServicePrincipalAuth::new(&server.uri(), &server.uri(), "tenant-1", principal());
        let err = auth.token(&Client::new()).await.unwrap_err();

        match err {
            TrainflowError::Authentication { tenant, message } => {
                assert_eq!(tenant, "tenant-1");
                assert!(message.contains("Invalid client secret"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scope_and_url() {
        let auth = ServicePrincipalAuth::new(
            "https://login.microsoftonline.com/",
            "https://management.azure.com/",
            "t",
            principal(),
        );
        assert_eq!(auth.token_url, "https://login.microsoftonline.com/t/oauth2/v2.0/token");
        assert_eq!(auth.scope, "https://management.azure.com/.default");
    }
}
