//! OAuth authorization and token storage.
//!
//! The pipeline only ever sees a ready access token. This module obtains one
//! through Google's installed-app flow, keeps it in a [`TokenStore`] and
//! refreshes it when it is about to expire. The consent redirect is caught
//! by a [`RedirectListener`] on the loopback address when it can bind.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::config::{self, Config};
use crate::error::{Result, SortError};

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube";
pub const TOKEN_FILE: &str = "token.json";
const EXPIRY_SKEW_SECS: i64 = 60;
const MAX_REQUEST_BYTES: usize = 8192;
const AUTHORIZED_PAGE: &str = "Authorized! You can close this window.";
const FAILED_PAGE: &str = "Authorization failed. Check the terminal for details.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Whether the access token is still usable at `now`. Tokens without an
    /// expiry are assumed valid.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + chrono::Duration::seconds(EXPIRY_SKEW_SECS) < expires_at,
            None => true,
        }
    }
}

/// Somewhere to keep the token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<StoredToken>>;
    fn save(&self, token: &StoredToken) -> Result<()>;
}

/// JSON file, owner-readable only.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore { path: path.into() }
    }

    /// `token.json` in the application config directory.
    pub fn default_location() -> Result<Self> {
        Ok(FileTokenStore::new(config::config_dir()?.join(TOKEN_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, token: &StoredToken) -> Result<()> {
        config::write_private(&self.path, &serde_json::to_string_pretty(token)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<StoredToken>>,
}

impl MemoryTokenStore {
    pub fn new(token: Option<StoredToken>) -> Self {
        MemoryTokenStore {
            token: Mutex::new(token),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredToken>> {
        Ok(self
            .token
            .lock()
            .map_err(|_| SortError::Config("token store poisoned".into()))?
            .clone())
    }

    fn save(&self, token: &StoredToken) -> Result<()> {
        *self
            .token
            .lock()
            .map_err(|_| SortError::Config("token store poisoned".into()))? = Some(token.clone());
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_stored(self, now: DateTime<Utc>, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self
                .expires_in
                .map(|secs| now + chrono::Duration::seconds(secs)),
        }
    }
}

pub struct OAuthClient {
    config: Config,
    client: Client,
}

impl OAuthClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(OAuthClient { config, client })
    }

    pub fn redirect_url(&self) -> &str {
        &self.config.redirect_url
    }

    /// The consent page the user must visit.
    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", YOUTUBE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| SortError::Config(format!("invalid authorization URL: {e}")))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<StoredToken> {
        let response = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .await?;
        info!("Authorization code exchanged");
        Ok(response.into_stored(Utc::now(), None))
    }

    /// Trades the refresh token for a new access token, keeping the old
    /// refresh token when the response carries none.
    pub async fn refresh(&self, token: &StoredToken) -> Result<StoredToken> {
        let refresh_token = token.refresh_token.as_deref().ok_or_else(|| {
            SortError::Unauthorized(
                "token expired and cannot be refreshed; run `sortyt auth`".into(),
            )
        })?;
        let response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
            ])
            .await?;
        debug!("Access token refreshed");
        Ok(response.into_stored(Utc::now(), token.refresh_token.clone()))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self.client.post(TOKEN_URL).form(form).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }
        match status.as_u16() {
            400 | 401 => Err(SortError::Unauthorized(format!(
                "token endpoint rejected the request: {body}; run `sortyt auth`"
            ))),
            _ => Err(SortError::from_status(status, body)),
        }
    }
}

/// Returns a usable access token, refreshing and persisting it if needed.
pub async fn access_token(oauth: &OAuthClient, store: &dyn TokenStore) -> Result<String> {
    let token = store.load()?.ok_or_else(|| {
        SortError::Unauthorized("no stored token; run `sortyt auth` first".into())
    })?;
    if token.is_fresh(Utc::now()) {
        return Ok(token.access_token);
    }

    let refreshed = oauth.refresh(&token).await?;
    store.save(&refreshed)?;
    Ok(refreshed.access_token)
}

/// Accepts either the bare authorization code or the whole redirected URL.
pub fn extract_auth_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned());
    }
    Some(input.to_string())
}

/// A per-attempt value for the `state` parameter.
pub fn new_state() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("sortyt-{:x}{:x}", nanos, std::process::id())
}

/// Loopback HTTP endpoint that receives the consent redirect.
pub struct RedirectListener {
    listener: TcpListener,
    path: String,
}

impl RedirectListener {
    /// Listens on the host and port named by `redirect_url`.
    pub async fn bind(redirect_url: &str) -> Result<Self> {
        let url = Url::parse(redirect_url)
            .map_err(|e| SortError::Config(format!("invalid redirect URL {redirect_url}: {e}")))?;
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .ok_or_else(|| SortError::Config(format!("redirect URL {redirect_url} has no host")))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SortError::Config(format!("redirect URL {redirect_url} has no port")))?;

        let listener = TcpListener::bind((host, port)).await?;
        debug!("Listening for the redirect on {}", listener.local_addr()?);
        Ok(RedirectListener {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Answers requests until one carries the authorization result, and
    /// returns its code. Unrelated requests (favicons, probes from other
    /// tools) get a 404 and are otherwise ignored.
    pub async fn wait_for_code(&self, expected_state: &str) -> Result<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            let mut buf = vec![0u8; MAX_REQUEST_BYTES];
            let n = stream.read(&mut buf).await?;
            let request = String::from_utf8_lossy(&buf[..n]);

            let outcome = request
                .lines()
                .next()
                .and_then(request_target)
                .and_then(|target| parse_callback(target, &self.path, expected_state));

            match outcome {
                None => {
                    debug!("Ignoring request from {}", peer);
                    respond(&mut stream, "404 Not Found", "Not found").await;
                }
                Some(result) => {
                    match &result {
                        Ok(_) => respond(&mut stream, "200 OK", AUTHORIZED_PAGE).await,
                        Err(_) => respond(&mut stream, "400 Bad Request", FAILED_PAGE).await,
                    }
                    info!("Received authorization redirect");
                    return result;
                }
            }
        }
    }
}

/// The target of a `GET` request line.
fn request_target(request_line: &str) -> Option<&str> {
    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("GET"), Some(target)) => Some(target),
        _ => None,
    }
}

/// `None` when `target` is not the callback or carries neither a code nor
/// an error.
fn parse_callback(
    target: &str,
    callback_path: &str,
    expected_state: &str,
) -> Option<Result<String>> {
    let url = Url::parse("http://localhost").ok()?.join(target).ok()?;
    if url.path() != callback_path {
        return None;
    }
    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Some(Err(SortError::Unauthorized(format!(
            "consent was not granted: {error}"
        ))));
    }
    let code = param("code")?;
    if param("state").as_deref() != Some(expected_state) {
        return Some(Err(SortError::Unauthorized(
            "authorization redirect carried an unexpected state".into(),
        )));
    }
    Some(Ok(code))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Could not answer the browser: {}", e);
    }
    let _ = stream.shutdown().await;
}
