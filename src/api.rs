// Remote client boundary: a small blocking HTTP client for the flow
// service, plus the Globus Auth native-app login it rides on. Everything
// is synchronous; each command is a handful of request-response exchanges.

use crate::config::{self, ServiceConfig};
use anyhow::{Context, Result};
use dialoguer::Input;
use log::{debug, warn};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Margin subtracted from a token's lifetime so it does not expire while a
/// request is in flight.
const EXPIRY_MARGIN_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Nothing usable is cached: no token file, an expired token without a
    /// refresh token, or a refresh token the auth service no longer accepts.
    /// During logout this means "already logged out"; elsewhere it means an
    /// interactive login is required.
    #[error("no valid credentials are cached")]
    NoValidCredentials,

    /// The token endpoint answered with an error other than the one above.
    #[error("token endpoint error: {0}")]
    TokenEndpoint(String),

    /// The auth request itself failed in transit.
    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Could not read the pasted authorization code from the terminal.
    #[error("could not read the authorization code: {0}")]
    Prompt(String),

    /// The token cache could not be written or removed.
    #[error("token cache {path}: {detail}")]
    Cache { path: String, detail: String },
}

/// How `connect` may acquire credentials.
#[derive(Debug, Clone, Copy)]
pub enum LoginPolicy {
    /// Normal path: reuse cached tokens, refresh when expired, and fall
    /// back to the browser-and-paste-code exchange when neither works.
    /// `force` skips the cache entirely; `no_browser` prints the login URL
    /// without trying to open it.
    Interactive { force: bool, no_browser: bool },
    /// Probe: cached or refreshed tokens only. Never prompts; fails with
    /// `AuthError::NoValidCredentials` when nothing usable is cached.
    CachedOnly,
}

/// Cached credentials, one JSON file per user.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at_epoch: u64,
}

impl TokenSet {
    fn from_grant(grant: TokenGrant, fallback_refresh: Option<String>) -> Self {
        TokenSet {
            access_token: grant.access_token,
            // A refresh grant usually omits the refresh token; keep the one
            // we refreshed with.
            refresh_token: grant.refresh_token.or(fallback_refresh),
            expires_at_epoch: now_epoch() + grant.expires_in,
        }
    }

    fn is_fresh(&self) -> bool {
        self.expires_at_epoch > now_epoch() + EXPIRY_MARGIN_SECS
    }
}

/// Successful answer from the token endpoint.
#[derive(Deserialize, Debug)]
struct TokenGrant {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: u64,
}

/// Error answer from the token endpoint (RFC 6749 shape).
#[derive(Deserialize, Debug)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Submission payload, also the wire body POSTed to the service.
#[derive(Serialize, Debug, Clone)]
pub struct SubmissionRequest {
    pub data_path: String,
    pub author_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_acls: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub delete_dir: bool,
    pub handle_git_repos: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    pub dry_run: bool,
    pub verbose: bool,
    pub force_http: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub bag_kwargs: Map<String, Value>,
}

/// What the service answers. On success the identifier fields are present
/// unless the submission was a dry run; on failure `error` says why.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SubmissionResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fair_re_dest_path: Option<String>,
    #[serde(default)]
    pub flow_id: Option<String>,
    #[serde(default)]
    pub flow_instance_id: Option<String>,
}

/// Status of one flow run: a one-line human summary plus whatever else the
/// service reported, kept verbatim for `--raw`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StatusResponse {
    pub clean_status: String,
    #[serde(flatten)]
    pub detail: Map<String, Value>,
}

/// The two remote calls the commands are built on. `FlowServiceClient` is
/// the real implementation; tests substitute their own.
pub trait FlowService {
    fn start_flow(&self, req: &SubmissionRequest) -> Result<SubmissionResponse>;
    fn check_status(&self, flow_id: &str, flow_instance_id: &str) -> Result<StatusResponse>;
}

/// The slice of a connected client that logout needs.
pub trait RevokeTokens {
    /// Revoke the cached credentials remotely and delete the local cache.
    fn revoke_tokens(self) -> Result<(), AuthError>;
}

/// Authenticated client for one flow service deployment.
pub struct FlowServiceClient {
    client: Client,
    base_url: String,
    tokens: TokenSet,
    token_cache: PathBuf,
}

impl FlowServiceClient {
    /// Build a client for the given deployment, acquiring credentials
    /// according to the policy. The only prompt this can raise is the
    /// authorization-code paste under `Interactive`.
    pub fn connect(config: &ServiceConfig, policy: LoginPolicy) -> Result<Self, AuthError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let tokens = obtain_tokens(&client, &config.token_cache, policy)?;
        debug!("connected to {}", config.base_url);
        Ok(FlowServiceClient {
            client,
            base_url: config.base_url.clone(),
            tokens,
            token_cache: config.token_cache.clone(),
        })
    }
}

impl FlowService for FlowServiceClient {
    fn start_flow(&self, req: &SubmissionRequest) -> Result<SubmissionResponse> {
        let url = format!("{}/submissions", &self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.tokens.access_token)
            .json(req)
            .send()
            .context("Failed to send submission request")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            anyhow::bail!("Submission failed: {} - {}", status, txt);
        }
        let resp: SubmissionResponse = res.json().context("Parsing submission response json")?;
        Ok(resp)
    }

    fn check_status(&self, flow_id: &str, flow_instance_id: &str) -> Result<StatusResponse> {
        let url = format!("{}/flows/{}/runs/{}", &self.base_url, flow_id, flow_instance_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.tokens.access_token)
            .send()
            .context("Failed to send status request")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            anyhow::bail!("Status check failed: {} - {}", status, txt);
        }
        let resp: StatusResponse = res.json().context("Parsing status response json")?;
        Ok(resp)
    }
}

impl RevokeTokens for FlowServiceClient {
    fn revoke_tokens(self) -> Result<(), AuthError> {
        let mut targets = vec![self.tokens.access_token.clone()];
        if let Some(refresh) = &self.tokens.refresh_token {
            targets.push(refresh.clone());
        }
        debug!("revoking {} token(s)", targets.len());
        for token in targets {
            let res = self
                .client
                .post(config::REVOKE_URL)
                .basic_auth(config::NATIVE_CLIENT_ID, None::<&str>)
                .form(&[("token", token.as_str())])
                .send()?;
            if !res.status().is_success() {
                let status = res.status();
                let txt = res.text().unwrap_or_else(|_| "".into());
                return Err(AuthError::TokenEndpoint(format!(
                    "revocation failed: {} - {}",
                    status, txt
                )));
            }
        }
        if self.token_cache.exists() {
            fs::remove_file(&self.token_cache).map_err(|e| AuthError::Cache {
                path: self.token_cache.display().to_string(),
                detail: e.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Get a usable token set under the given policy: cached, refreshed, or
/// (interactive only) freshly exchanged.
fn obtain_tokens(client: &Client, cache: &Path, policy: LoginPolicy) -> Result<TokenSet, AuthError> {
    let force = matches!(policy, LoginPolicy::Interactive { force: true, .. });
    if !force {
        if let Some(tokens) = read_cache(cache) {
            if tokens.is_fresh() {
                debug!("using cached access token");
                return Ok(tokens);
            }
            if let Some(refresh) = tokens.refresh_token.clone() {
                debug!("access token expired; trying the refresh token");
                match refresh_grant(client, &refresh) {
                    Ok(grant) => {
                        let tokens = TokenSet::from_grant(grant, Some(refresh));
                        write_cache(cache, &tokens)?;
                        return Ok(tokens);
                    }
                    Err(AuthError::NoValidCredentials) => {
                        debug!("refresh token no longer valid");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
    match policy {
        LoginPolicy::CachedOnly => Err(AuthError::NoValidCredentials),
        LoginPolicy::Interactive { no_browser, .. } => {
            let grant = interactive_grant(client, no_browser)?;
            let tokens = TokenSet::from_grant(grant, None);
            write_cache(cache, &tokens)?;
            Ok(tokens)
        }
    }
}

fn refresh_grant(client: &Client, refresh_token: &str) -> Result<TokenGrant, AuthError> {
    let res = client
        .post(config::TOKEN_URL)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config::NATIVE_CLIENT_ID),
        ])
        .send()?;
    parse_grant(res, true)
}

/// Walk the user through the authorize-and-paste-code exchange.
fn interactive_grant(client: &Client, no_browser: bool) -> Result<TokenGrant, AuthError> {
    let authorize = reqwest::Url::parse_with_params(
        config::AUTHORIZE_URL,
        &[
            ("client_id", config::NATIVE_CLIENT_ID),
            ("redirect_uri", config::AUTH_REDIRECT_URI),
            ("scope", config::AUTH_SCOPES),
            ("response_type", "code"),
            ("access_type", "offline"),
        ],
    )
    .map_err(|e| AuthError::TokenEndpoint(format!("bad authorize url: {}", e)))?;

    println!("Log in with your Globus account, then paste the code you are given:");
    println!("  {}", authorize);
    if !no_browser {
        // Best effort; the URL is already printed in case this goes nowhere.
        let _ = open_in_browser(authorize.as_str());
    }

    let code: String = Input::new()
        .with_prompt("Authorization code")
        .interact_text()
        .map_err(|e| AuthError::Prompt(e.to_string()))?;
    debug!("exchanging authorization code");

    let res = client
        .post(config::TOKEN_URL)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code.trim()),
            ("redirect_uri", config::AUTH_REDIRECT_URI),
            ("client_id", config::NATIVE_CLIENT_ID),
        ])
        .send()?;
    parse_grant(res, false)
}

fn parse_grant(res: Response, from_refresh: bool) -> Result<TokenGrant, AuthError> {
    if res.status().is_success() {
        return res
            .json()
            .map_err(|e| AuthError::TokenEndpoint(format!("unreadable grant response: {}", e)));
    }
    let status = res.status();
    let body = res.text().unwrap_or_else(|_| "".into());
    Err(classify_token_failure(status, &body, from_refresh))
}

/// An `invalid_grant` on a refresh means the stored refresh token is dead,
/// which is the "no valid credentials" condition. The same error during a
/// code exchange is an ordinary failure (mistyped or expired code).
fn classify_token_failure(status: StatusCode, body: &str, from_refresh: bool) -> AuthError {
    if let Ok(err) = serde_json::from_str::<TokenEndpointError>(body) {
        if from_refresh && err.error == "invalid_grant" {
            return AuthError::NoValidCredentials;
        }
        let detail = match err.error_description {
            Some(d) => format!("{} ({})", d, err.error),
            None => err.error,
        };
        return AuthError::TokenEndpoint(detail);
    }
    AuthError::TokenEndpoint(format!("{} - {}", status, body))
}

/// A cache that cannot be read or parsed is the same as no cache at all.
fn read_cache(path: &Path) -> Option<TokenSet> {
    let raw = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&raw) {
        Ok(tokens) => Some(tokens),
        Err(e) => {
            warn!("ignoring unreadable token cache {}: {}", path.display(), e);
            None
        }
    }
}

fn write_cache(path: &Path, tokens: &TokenSet) -> Result<(), AuthError> {
    let body = serde_json::to_string_pretty(tokens).map_err(|e| AuthError::Cache {
        path: path.display().to_string(),
        detail: e.to_string(),
    })?;
    fs::write(path, body).map_err(|e| AuthError::Cache {
        path: path.display().to_string(),
        detail: e.to_string(),
    })
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn open_in_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "windows")]
    return std::process::Command::new("cmd")
        .args(["/C", "start", url])
        .spawn()
        .map(|_| ());
    #[cfg(target_os = "macos")]
    return std::process::Command::new("open").arg(url).spawn().map(|_| ());
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    std::process::Command::new("xdg-open")
        .arg(url)
        .spawn()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_client() -> Client {
        Client::builder().build().unwrap()
    }

    #[test]
    fn probe_with_no_cache_reports_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("tokens.json");
        let err = obtain_tokens(&plain_client(), &cache, LoginPolicy::CachedOnly).unwrap_err();
        assert!(matches!(err, AuthError::NoValidCredentials));
    }

    #[test]
    fn probe_with_corrupt_cache_reports_no_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("tokens.json");
        fs::write(&cache, "{oops").unwrap();
        let err = obtain_tokens(&plain_client(), &cache, LoginPolicy::CachedOnly).unwrap_err();
        assert!(matches!(err, AuthError::NoValidCredentials));
    }

    #[test]
    fn probe_with_fresh_cache_uses_it_without_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("tokens.json");
        let stored = TokenSet {
            access_token: "tok-1".into(),
            refresh_token: None,
            expires_at_epoch: now_epoch() + 3600,
        };
        fs::write(&cache, serde_json::to_string(&stored).unwrap()).unwrap();

        let tokens = obtain_tokens(&plain_client(), &cache, LoginPolicy::CachedOnly).unwrap();
        assert_eq!(tokens.access_token, "tok-1");
    }

    #[test]
    fn a_token_near_expiry_is_not_fresh() {
        let tokens = TokenSet {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at_epoch: now_epoch() + 5,
        };
        assert!(!tokens.is_fresh());
    }

    #[test]
    fn invalid_grant_is_tagged_only_for_refreshes() {
        let body = r#"{"error": "invalid_grant"}"#;
        let err = classify_token_failure(StatusCode::UNAUTHORIZED, body, true);
        assert!(matches!(err, AuthError::NoValidCredentials));

        let err = classify_token_failure(StatusCode::UNAUTHORIZED, body, false);
        assert!(matches!(err, AuthError::TokenEndpoint(_)));
    }

    #[test]
    fn token_failures_carry_the_description_when_present() {
        let body = r#"{"error": "invalid_scope", "error_description": "scope not allowed"}"#;
        let err = classify_token_failure(StatusCode::BAD_REQUEST, body, true);
        match err {
            AuthError::TokenEndpoint(detail) => {
                assert!(detail.contains("scope not allowed"));
                assert!(detail.contains("invalid_scope"));
            }
            other => panic!("expected TokenEndpoint, got {:?}", other),
        }
    }
}
