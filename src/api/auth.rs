use log::warn;
use reqwest::header::WWW_AUTHENTICATE;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::sync::RwLock;

use crate::api::error::ApiError;

/// Bearer-token exchange for the OCI distribution auth flow.
///
/// Performs an initial unauthenticated probe; on a `401` challenge of the
/// form `Bearer realm=...,service=...,scope=...` it exchanges the
/// caller-supplied credential for a scoped token. The resulting token is
/// cached for the remainder of the cleanup task - a run never needs more
/// than one token per scope since requests to one package happen
/// sequentially.
pub struct Auth {
    credential: Option<String>,
    token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

struct Challenge {
    realm: String,
    service: Option<String>,
    scope: Option<String>,
}

impl Auth {
    pub fn new(credential: Option<String>) -> Self {
        Self {
            credential,
            token: RwLock::new(None),
        }
    }

    /// Returns the cached token, if any has been negotiated yet.
    pub fn cached_token(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// Inspect a `401` response and, if it carries a `Bearer` challenge,
    /// exchange the credential for a scoped token and cache it.
    pub async fn authenticate(&self, client: &Client, response: &Response) -> Result<String, ApiError> {
        let challenge = parse_challenge(response)?;
        let token = self.exchange(client, &challenge).await?;
        *self.token.write().expect("token lock poisoned") = Some(token.clone());
        Ok(token)
    }

    async fn exchange(&self, client: &Client, challenge: &Challenge) -> Result<String, ApiError> {
        let mut request = client.get(&challenge.realm);
        if let Some(service) = &challenge.service {
            request = request.query(&[("service", service)]);
        }
        if let Some(scope) = &challenge.scope {
            request = request.query(&[("scope", scope)]);
        }
        if let Some(credential) = &self.credential {
            request = request.basic_auth("token", Some(credential));
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ApiError::Unauthorized);
        }
        let body = response.json::<TokenResponse>().await?;
        body.token
            .or(body.access_token)
            .ok_or(ApiError::Unauthorized)
    }
}

fn parse_challenge(response: &Response) -> Result<Challenge, ApiError> {
    let header = response
        .headers()
        .get(WWW_AUTHENTICATE)
        .ok_or(ApiError::InvalidAuthChallenge)?
        .to_str()
        .map_err(|_| ApiError::InvalidAuthChallenge)?;

    let Some(rest) = header.strip_prefix("Bearer ") else {
        warn!("Received non-bearer authentication challenge '{header}'");
        return Err(ApiError::InvalidAuthChallenge);
    };

    let mut realm = None;
    let mut service = None;
    let mut scope = None;
    for part in rest.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let value = value.trim_matches('"').to_string();
        match key {
            "realm" => realm = Some(value),
            "service" => service = Some(value),
            "scope" => scope = Some(value),
            _ => {}
        }
    }

    Ok(Challenge {
        realm: realm.ok_or(ApiError::InvalidAuthChallenge)?,
        service,
        scope,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cached_token_starts_empty() {
        let auth = Auth::new(Some(String::from("secret")));
        assert!(auth.cached_token().is_none());
    }
}
