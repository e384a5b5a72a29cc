//! Authentication against Xray.
//!
//! Three credential sets are understood, checked in this order:
//! 1. `XRAY_CLIENT_ID` + `XRAY_CLIENT_SECRET` - JWT exchange against Xray cloud
//! 2. `XRAY_API_TOKEN` + `JIRA_API_URL` - personal access token for Xray server
//! 3. `XRAY_USERNAME` + `XRAY_PASSWORD` + `JIRA_API_URL` - basic auth for Xray server
//!
//! The first complete set wins. Incomplete sets are skipped silently.

use crate::config::{
    api_url, Env, ENV_XRAY_API_TOKEN, ENV_XRAY_CLIENT_ID, ENV_XRAY_CLIENT_SECRET,
    ENV_XRAY_PASSWORD, ENV_XRAY_USERNAME,
};
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use url::Url;

pub enum Credentials {
    Jwt(JwtCredentials),
    Pat(PatCredentials),
    Basic(BasicCredentials),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Jwt(x) => f
                .debug_struct("Jwt")
                .field("client_id", &x.client_id)
                .finish_non_exhaustive(),
            Credentials::Pat(_) => f.debug_struct("Pat").finish_non_exhaustive(),
            Credentials::Basic(x) => f
                .debug_struct("Basic")
                .field("username", &x.username)
                .finish_non_exhaustive(),
        }
    }
}

pub fn resolve(env: &Env) -> Result<Credentials> {
    let value = |key: &str| env.get(key).map(|x| x.trim()).filter(|x| !x.is_empty());
    if let (Some(client_id), Some(client_secret)) =
        (value(ENV_XRAY_CLIENT_ID), value(ENV_XRAY_CLIENT_SECRET))
    {
        debug!("Using JWT credentials");
        return Ok(Credentials::Jwt(JwtCredentials::new(client_id, client_secret)));
    }
    if let (Some(token), Some(_)) = (value(ENV_XRAY_API_TOKEN), api_url(env)) {
        debug!("Using personal access token credentials");
        return Ok(Credentials::Pat(PatCredentials::new(token)));
    }
    if let (Some(username), Some(password), Some(_)) = (
        value(ENV_XRAY_USERNAME),
        value(ENV_XRAY_PASSWORD),
        api_url(env),
    ) {
        debug!("Using basic auth credentials");
        return Ok(Credentials::Basic(BasicCredentials::new(username, password)));
    }
    Err(Error::NoViableCredentials)
}

/// Client credentials exchanged for a bearer token on first use.
///
/// The token is kept for the lifetime of these credentials so that all
/// requests of one run share a single exchange.
pub struct JwtCredentials {
    client_id: String,
    client_secret: String,
    token: Mutex<Option<String>>,
}

#[derive(Serialize)]
struct AuthenticationBody<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

impl JwtCredentials {
    pub fn new(client_id: &str, client_secret: &str) -> JwtCredentials {
        JwtCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Mutex::new(None),
        }
    }

    pub fn authorization_header(
        &self,
        client: &Client,
        authentication_url: &Url,
    ) -> Result<HeaderValue> {
        let mut token = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if token.is_none() {
            *token = Some(self.exchange(client, authentication_url)?);
        }
        let token = token.as_deref().unwrap_or_default();
        sensitive(HeaderValue::from_str(&format!("Bearer {}", token)))
    }

    fn exchange(&self, client: &Client, authentication_url: &Url) -> Result<String> {
        info!("Authenticating to: {}...", authentication_url);
        let failed = |e: reqwest::Error| Error::Authentication(e.to_string());
        let resp = client
            .post(authentication_url.clone())
            .json(&AuthenticationBody {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .map_err(failed)?;
        let status = resp.status();
        let body = resp.text().map_err(failed)?;
        if !status.is_success() {
            return Err(Error::Authentication(format!(
                "{} returned {}: {}",
                authentication_url, status, body
            )));
        }
        // The token arrives as a JSON string literal.
        let token = serde_json::from_str::<String>(&body).unwrap_or_else(|_| body.trim().to_owned());
        if token.is_empty() {
            return Err(Error::Authentication(format!(
                "{} returned an empty token",
                authentication_url
            )));
        }
        info!("Authentication successful");
        Ok(token)
    }
}

pub struct PatCredentials {
    token: String,
}

impl PatCredentials {
    pub fn new(token: &str) -> PatCredentials {
        PatCredentials {
            token: token.into(),
        }
    }

    pub fn authorization_header(&self) -> Result<HeaderValue> {
        sensitive(HeaderValue::from_str(&format!("Bearer {}", self.token)))
    }
}

pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(username: &str, password: &str) -> BasicCredentials {
        BasicCredentials {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn authorization_header(&self) -> Result<HeaderValue> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        sensitive(HeaderValue::from_str(&format!("Basic {}", encoded)))
    }
}

fn sensitive(
    value: std::result::Result<HeaderValue, reqwest::header::InvalidHeaderValue>,
) -> Result<HeaderValue> {
    let mut value = value
        .map_err(|_| Error::Authentication("credentials contain invalid header characters".into()))?;
    value.set_sensitive(true);
    Ok(value)
}
