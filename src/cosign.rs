//! Client for the legacy cosign session-validation webapi.
//!
//! One outbound GET per check, single attempt, no retries. The validator's
//! answer is three-way: authenticated, unauthenticated, or an error the
//! validator itself reports; transport and decode trouble surface as `Err`.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::config::Config;

/// Outcome of one validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The validator confirmed a live session.
    Authenticated { principal: String, realm: String },
    /// The validator answered HTTP 401: the cookie is not a live session.
    Unauthenticated,
    /// The validator reported an application error; `message` is its own text.
    Rejected { message: String },
}

#[derive(Debug, Deserialize)]
struct CheckBody {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: CheckData,
}

#[derive(Debug, Default, Deserialize)]
struct CheckData {
    #[serde(default)]
    principal: String,
    #[serde(default)]
    realm: String,
}

#[derive(Clone)]
pub struct CosignClient {
    http: reqwest::Client,
    base: String,
    name: String,
    password: String,
}

// Hand-written so the service credential can never leak through {:?}
impl std::fmt::Debug for CosignClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosignClient")
            .field("base", &self.base)
            .field("name", &self.name)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CosignClient {
    pub fn new(cfg: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: cfg.cosign_url.trim_end_matches('/').to_string(),
            name: cfg.cosign_name.clone(),
            password: cfg.cosign_password.clone(),
        }
    }

    /// Ask the validator whether `cookie` is a live session for `client_ip`.
    pub async fn check(&self, cookie: &str, client_ip: &str) -> Result<Verdict> {
        let url = self.check_url(cookie, client_ip);
        let resp = self.http.get(&url).send().await?;

        // HTTP 401 means "not a session" no matter what the body says, so it
        // is checked before any decoding.
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Ok(Verdict::Unauthenticated);
        }

        let body: CheckBody = resp
            .json()
            .await
            .map_err(|_| anyhow!("could not decode JSON"))?;
        if body.status != "success" {
            return Ok(Verdict::Rejected { message: body.message });
        }
        Ok(Verdict::Authenticated {
            principal: body.data.principal,
            realm: body.data.realm,
        })
    }

    /// The legacy check URL. Spaces in the cookie must travel as the literal
    /// bytes `%2B` — the validator reverses exactly that substitution, so
    /// standard percent-encoding of space would corrupt the token.
    fn check_url(&self, cookie: &str, client_ip: &str) -> String {
        format!(
            "{}/check/{}/{}?ip={}&cookie={}",
            self.base,
            self.name,
            self.password,
            client_ip,
            cookie.replace(' ', "%2B")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CosignClient {
        let cfg = Config::from_lookup(|key| match key {
            "PROVOST_COSIGN_NAME" => Some("svc".to_string()),
            "PROVOST_COSIGN_PASSWORD" => Some("secret".to_string()),
            "PROVOST_COSIGN_URL" => Some("http://validator:6663/".to_string()),
            _ => None,
        })
        .unwrap();
        CosignClient::new(&cfg)
    }

    #[test]
    fn check_url_embeds_credentials_and_params() {
        let url = client().check_url("tok", "10.0.0.7");
        assert_eq!(url, "http://validator:6663/check/svc/secret?ip=10.0.0.7&cookie=tok");
    }

    #[test]
    fn cookie_spaces_become_literal_percent_2b() {
        let url = client().check_url("a b c", "10.0.0.7");
        assert!(url.ends_with("&cookie=a%2Bb%2Bc"));
    }

    #[test]
    fn debug_output_redacts_the_password() {
        let printed = format!("{:?}", client());
        assert!(!printed.contains("secret"), "printed: {printed}");
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn check_body_tolerates_missing_fields() {
        let body: CheckBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.status, "");
        assert_eq!(body.message, "");
        assert_eq!(body.data.principal, "");
        assert_eq!(body.data.realm, "");
    }
}
