//! Identity resolvers.
//!
//! [`GoogleIdentityResolver`] implements the OAuth 2.0 authorization-code
//! flow: build a consent URL, exchange the returned code for an access token,
//! then read `{email, name, picture}` from the userinfo endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::IdentityConfig;
use crate::error::{Error, Result};
use crate::models::Identity;
use crate::traits::IdentityResolver;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";

/// Resolver used when no identity provider is configured.
pub struct DisabledResolver;

#[async_trait]
impl IdentityResolver for DisabledResolver {
    fn authorization_url(&self) -> Result<String> {
        Err(Error::Auth("no identity provider configured".to_string()))
    }

    async fn resolve(&self, _auth_code: &str) -> Result<Identity> {
        Err(Error::Auth("no identity provider configured".to_string()))
    }
}

pub struct GoogleIdentityResolver {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl GoogleIdentityResolver {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        let client_id = config
            .client_id
            .clone()
            .ok_or_else(|| Error::Auth("identity.client_id required".to_string()))?;
        let redirect_uri = config
            .redirect_uri
            .clone()
            .ok_or_else(|| Error::Auth("identity.redirect_uri required".to_string()))?;
        let client_secret = std::env::var(&config.client_secret_env).map_err(|_| {
            Error::Auth(format!(
                "{} environment variable not set",
                config.client_secret_env
            ))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Auth(e.to_string()))?;

        Ok(Self {
            client,
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

/// Consent URL for the authorization-code flow.
pub fn google_authorization_url(client_id: &str, redirect_uri: &str) -> Result<String> {
    let url = Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", "openid email profile"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::Auth(e.to_string()))?;
    Ok(url.into())
}

#[async_trait]
impl IdentityResolver for GoogleIdentityResolver {
    fn authorization_url(&self) -> Result<String> {
        google_authorization_url(&self.client_id, &self.redirect_uri)
    }

    async fn resolve(&self, auth_code: &str) -> Result<Identity> {
        let token: TokenResponse = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", auth_code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Auth(format!("token exchange failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid token response: {}", e)))?;

        let identity: Identity = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Auth(format!("userinfo request failed: {}", e)))?
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid userinfo response: {}", e)))?;

        Ok(identity)
    }
}

pub fn create_resolver(config: &IdentityConfig) -> Result<Box<dyn IdentityResolver>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledResolver)),
        "google" => Ok(Box::new(GoogleIdentityResolver::new(config)?)),
        other => Err(Error::Auth(format!("unknown identity provider: {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url_params() {
        let url = google_authorization_url("cid", "http://localhost:8088/auth/callback").unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.host_str(), Some("accounts.google.com"));

        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".into(), "cid".into())));
        assert!(pairs.contains(&("scope".into(), "openid email profile".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:8088/auth/callback".into()
        )));
    }
}
