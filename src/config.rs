// Service configuration. Every deployment-specific value lives here and is
// handed to the flow and auth code as an explicit `ServiceConfig`, so a
// second instance or a test double never fights over process-wide state.

use anyhow::Result;
use std::path::PathBuf;

/// Environment override for the flow service base URL. Handy when pointing
/// the tool at a local service during development.
pub const SERVICE_URL_VAR: &str = "FAIRFLOW_SERVICE_URL";

/// Globus Auth endpoints used by the native-app login flow.
pub const AUTHORIZE_URL: &str = "https://auth.globus.org/v2/oauth2/authorize";
pub const TOKEN_URL: &str = "https://auth.globus.org/v2/oauth2/token";
pub const REVOKE_URL: &str = "https://auth.globus.org/v2/oauth2/token/revoke";

/// Native-app client id registered for this tool with Globus Auth.
pub const NATIVE_CLIENT_ID: &str = "f7a54c83-9e2b-4a6c-8d17-3c5b9a1e0f42";

/// Scopes requested at login. `offline_access` is what yields the refresh
/// token that keeps later commands from prompting again.
pub const AUTH_SCOPES: &str = "openid profile email offline_access";

/// Where Globus sends the user to copy the authorization code from.
pub const AUTH_REDIRECT_URI: &str = "https://auth.globus.org/v2/web/auth-code";

const TOKEN_CACHE_FILE: &str = ".fairflow_tokens.json";

const PROD_BASE_URL: &str = "https://ingest.fair-re.org/api";
const STAGING_BASE_URL: &str = "https://ingest-staging.fair-re.org/api";
const DEV_BASE_URL: &str = "https://ingest-dev.fair-re.org/api";

const PROD_EP_URL: &str = "https://g-5f8c2a.1d0e9b.data.globus.org";
const STAGING_EP_URL: &str = "https://g-93b04e.7cf215.data.globus.org";
const DEV_EP_URL: &str = "https://g-1ac7d9.40e8b3.data.globus.org";

const PROD_EP_UUID: &str = "b8c0b3d2-4b0a-4d8e-9d6a-2f63e1a9d8c4";
const STAGING_EP_UUID: &str = "3e91f0aa-6c1d-4f2b-8b07-55d2c9a4e718";
const DEV_EP_UUID: &str = "a174de60-98f2-4c33-9a58-0c4b7f21d93e";

/// Everything the clients need to know about one deployment of the flow
/// service: where to submit, and which data endpoint the finished bags land
/// on (used to build the links shown after a submission).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Instance name the user asked for; None means the default deployment.
    /// This exact value is recorded with a successful run so a later
    /// `status` queries the same deployment.
    pub instance: Option<String>,
    /// Base URL of the flow service API.
    pub base_url: String,
    /// HTTPS base of the data endpoint serving finished bags.
    pub endpoint_base_url: String,
    /// Globus collection id of that endpoint, for web-app links.
    pub endpoint_uuid: String,
    /// Token cache file for this user.
    pub token_cache: PathBuf,
}

impl ServiceConfig {
    /// Resolve a named service instance (`prod` when none is given). The
    /// `FAIRFLOW_SERVICE_URL` environment variable, when set, replaces the
    /// resolved base URL.
    pub fn resolve(instance: Option<&str>) -> Result<Self> {
        let name = instance.unwrap_or("prod");
        let (base_url, endpoint_base_url, endpoint_uuid) = match name {
            "prod" => (PROD_BASE_URL, PROD_EP_URL, PROD_EP_UUID),
            "staging" => (STAGING_BASE_URL, STAGING_EP_URL, STAGING_EP_UUID),
            "dev" => (DEV_BASE_URL, DEV_EP_URL, DEV_EP_UUID),
            other => anyhow::bail!(
                "Unknown service instance '{}' (expected prod, staging or dev)",
                other
            ),
        };
        let base_url = std::env::var(SERVICE_URL_VAR).unwrap_or_else(|_| base_url.to_string());
        Ok(ServiceConfig {
            instance: instance.map(|s| s.to_string()),
            base_url,
            endpoint_base_url: endpoint_base_url.to_string(),
            endpoint_uuid: endpoint_uuid.to_string(),
            token_cache: default_token_cache(),
        })
    }
}

fn default_token_cache() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(TOKEN_CACHE_FILE)
}
