//! Startup configuration. Loaded once from the environment, immutable
//! afterwards, and passed by construction into the server state; nothing
//! reads the environment again after startup and there is no hot-reload.

use anyhow::{bail, Result};

const DEFAULT_ORIGINS: &str = "https://betterinformatics.com,https://alpha.betterinformatics.com";

#[derive(Clone)]
pub struct Config {
    pub log_level: String,
    /// Bind address for the HTTP listener.
    pub address: String,
    /// Service identity registered with the cosign validator.
    pub cosign_name: String,
    pub cosign_password: String,
    /// Base URL of the cosign check endpoint.
    pub cosign_url: String,
    /// Name of the cookie carrying the opaque session token.
    pub cookie_name: String,
    /// The single realm this deployment accepts (compared case-sensitively).
    pub accepted_realm: String,
    pub ldap_url: String,
    /// Base distinguished name both directory searches are rooted at.
    pub base_dn: String,
    /// Origins allowed credentialed cross-origin access; the first entry
    /// doubles as the fallback origin handed to everyone else.
    pub allowed_origins: Vec<String>,
}

// Hand-written so the validator credential can never leak through {:?}
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("log_level", &self.log_level)
            .field("address", &self.address)
            .field("cosign_name", &self.cosign_name)
            .field("cosign_password", &"<redacted>")
            .field("cosign_url", &self.cosign_url)
            .field("cookie_name", &self.cookie_name)
            .field("accepted_realm", &self.accepted_realm)
            .field("ldap_url", &self.ldap_url)
            .field("base_dn", &self.base_dn)
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl Config {
    /// Load from process environment variables (`PROVOST_*`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary lookup function. Tests use this to avoid
    /// mutating process-global environment state.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let Some(cosign_name) = get("PROVOST_COSIGN_NAME") else {
            bail!("PROVOST_COSIGN_NAME is required");
        };
        let Some(cosign_password) = get("PROVOST_COSIGN_PASSWORD") else {
            bail!("PROVOST_COSIGN_PASSWORD is required");
        };

        let allowed_origins: Vec<String> = var("PROVOST_ALLOWED_ORIGINS", DEFAULT_ORIGINS)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if allowed_origins.is_empty() {
            bail!("PROVOST_ALLOWED_ORIGINS must name at least one origin");
        }

        Ok(Config {
            log_level: var("PROVOST_LOG_LEVEL", "debug"),
            address: var("PROVOST_ADDRESS", "0.0.0.0:8080"),
            cosign_name,
            cosign_password,
            cosign_url: var("PROVOST_COSIGN_URL", "http://localhost:6663"),
            cookie_name: var("PROVOST_COOKIE_NAME", "cosign-betterinformatics.com"),
            accepted_realm: var("PROVOST_REALM", "INF.ED.AC.UK"),
            ldap_url: var("PROVOST_LDAP_URL", "ldap://localhost:1389"),
            base_dn: var("PROVOST_BASE_DN", "dc=inf,dc=ed,dc=ac,dc=uk"),
            allowed_origins,
        })
    }
}
