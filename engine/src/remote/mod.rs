//! Remote update host client
//!
//! This module owns the wire contract with the secure updates server:
//!
//! - `GET  {host}/wp-json/secure-updates-server/v1/connected`
//! - `GET  {host}/wp-json/secure-updates-server/v1/download/{slug}`
//! - `POST {host}/wp-json/secure-updates-server/v1/plugins`
//!
//! The [`RemoteHost`] trait is the seam the engine talks through;
//! [`HttpRemote`] implements it on `reqwest` with rustls certificate
//! validation and a finite timeout on every request. Redirects are never
//! followed; a 3xx answer is a rejection. Plaintext transport is a
//! configuration error, with one opt-in exception for loopback hosts used
//! in local development.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use sdk::errors::UpdateError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::{Host, Url};

use crate::secrets::SecretString;

pub mod endpoints;

/// Default timeout for every remote request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Body of the inventory sync request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginsPayload {
    pub plugins: Vec<String>,
}

/// Download metadata published for a mirrored plugin
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DownloadMetadata {
    /// Hex SHA-256 of the package
    #[serde(default)]
    pub checksum: Option<String>,
}

/// Operations the engine needs from the update host
#[async_trait]
pub trait RemoteHost: Send + Sync {
    /// Unauthenticated reachability check; succeeds on exactly HTTP 200
    async fn check_connected(&self, base_url: &str) -> Result<(), UpdateError>;

    /// Authenticated inventory push; succeeds on any 2xx
    async fn send_plugins(
        &self,
        base_url: &str,
        api_key: &SecretString,
        site_home: &str,
        slugs: &[String],
    ) -> Result<(), UpdateError>;

    /// Download metadata for one slug; succeeds on exactly HTTP 200
    async fn download_metadata(
        &self,
        base_url: &str,
        slug: &str,
    ) -> Result<DownloadMetadata, UpdateError>;
}

/// Parse a host URL and refuse plaintext transport
///
/// `http://` is accepted only when `allow_plaintext_loopback` is set and the
/// host is `localhost`, `127.0.0.0/8` or `::1`.
pub fn ensure_secure_url(raw: &str, allow_plaintext_loopback: bool) -> Result<Url, UpdateError> {
    let url = Url::parse(raw.trim()).map_err(|e| UpdateError::InvalidUrl(e.to_string()))?;

    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_plaintext_loopback && is_loopback(&url) => Ok(url),
        "http" => Err(UpdateError::InsecureTransport(raw.trim().to_string())),
        other => Err(UpdateError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// `reqwest`-backed implementation of [`RemoteHost`]
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    allow_plaintext_loopback: bool,
}

impl HttpRemote {
    /// Create a client with the given request timeout
    ///
    /// # Errors
    /// Returns `UpdateError::Config` for a zero timeout or if the TLS
    /// backend cannot be initialised.
    pub fn new(timeout: Duration, allow_plaintext_loopback: bool) -> Result<Self, UpdateError> {
        if timeout.is_zero() {
            return Err(UpdateError::Config(
                "remote requests need a finite, non-zero timeout".to_string(),
            ));
        }

        let client = Client::builder()
            .user_agent(concat!("secure-updates/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout)
            .https_only(!allow_plaintext_loopback)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .build()
            .map_err(|e| UpdateError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            allow_plaintext_loopback,
        })
    }

    /// Client with the default 15 second timeout and HTTPS only
    pub fn with_defaults() -> Result<Self, UpdateError> {
        Self::new(DEFAULT_TIMEOUT, false)
    }

    fn checked(&self, base_url: &str) -> Result<(), UpdateError> {
        ensure_secure_url(base_url, self.allow_plaintext_loopback).map(|_| ())
    }
}

fn map_transport_error(e: reqwest::Error) -> UpdateError {
    if e.is_timeout() {
        UpdateError::Timeout
    } else {
        UpdateError::Transport(e.to_string())
    }
}

#[async_trait]
impl RemoteHost for HttpRemote {
    async fn check_connected(&self, base_url: &str) -> Result<(), UpdateError> {
        self.checked(base_url)?;
        let url = endpoints::connected(base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(UpdateError::RemoteRejection {
                status: status.as_u16(),
            }),
        }
    }

    async fn send_plugins(
        &self,
        base_url: &str,
        api_key: &SecretString,
        site_home: &str,
        slugs: &[String],
    ) -> Result<(), UpdateError> {
        self.checked(base_url)?;
        let url = endpoints::plugins(base_url);
        let payload = PluginsPayload {
            plugins: slugs.to_vec(),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key.unsecure())
            .header("X-Client-Home", site_home)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::RemoteRejection {
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    async fn download_metadata(
        &self,
        base_url: &str,
        slug: &str,
    ) -> Result<DownloadMetadata, UpdateError> {
        self.checked(base_url)?;
        let url = endpoints::download(base_url, slug);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status() != StatusCode::OK {
            return Err(UpdateError::RemoteRejection {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(map_transport_error)?;
        serde_json::from_str(&body).map_err(|e| UpdateError::MalformedResponse(e.to_string()))
    }
}
