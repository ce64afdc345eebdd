//! Typed Rust client for the DigitalOcean v2 API.
//!
//! Covers the subset needed to manage a single droplet through its
//! lifecycle: droplets (create, get, delete) and droplet actions
//! (rename, resize, rebuild, power) with their status.

mod types;

pub use types::*;

const BASE_URL: &str = "https://api.digitalocean.com/v2";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("digitalocean api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("digitalocean api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

impl Error {
    /// HTTP status of the failed call, if the server answered at all.
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Request(e) => e.status(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the DigitalOcean droplet REST API.
#[derive(Clone)]
pub struct DropletsClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl DropletsClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, BASE_URL)
    }

    /// Point the client at a different API root (e.g. a local mock).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body,
            });
        }
        Ok(resp)
    }

    // ── Droplets ────────────────────────────────────────────────────

    pub async fn create_droplet(&self, req: &CreateDropletRequest) -> Result<Droplet> {
        let resp = self
            .http
            .post(self.url("/droplets"))
            .header("Authorization", self.auth())
            .json(req)
            .send()
            .await?;

        let envelope: DropletEnvelope = Self::check(resp, "create droplet").await?.json().await?;
        Ok(envelope.droplet)
    }

    pub async fn get_droplet(&self, droplet_id: u64) -> Result<Droplet> {
        let resp = self
            .http
            .get(self.url(&format!("/droplets/{droplet_id}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        let envelope: DropletEnvelope = Self::check(resp, "get droplet").await?.json().await?;
        Ok(envelope.droplet)
    }

    /// Destroy a droplet. A 404 is reported as an error like any other
    /// status; callers decide whether "already gone" is acceptable.
    pub async fn delete_droplet(&self, droplet_id: u64) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("/droplets/{droplet_id}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, "delete droplet").await?;
        Ok(())
    }

    // ── Actions ─────────────────────────────────────────────────────

    pub async fn droplet_action(&self, droplet_id: u64, action: &DropletAction) -> Result<Action> {
        let resp = self
            .http
            .post(self.url(&format!("/droplets/{droplet_id}/actions")))
            .header("Authorization", self.auth())
            .json(action)
            .send()
            .await?;

        let envelope: ActionEnvelope = Self::check(resp, "droplet action").await?.json().await?;
        Ok(envelope.action)
    }

    pub async fn get_action(&self, action_id: u64) -> Result<Action> {
        let resp = self
            .http
            .get(self.url(&format!("/actions/{action_id}")))
            .header("Authorization", self.auth())
            .send()
            .await?;

        let envelope: ActionEnvelope = Self::check(resp, "get action").await?.json().await?;
        Ok(envelope.action)
    }
}
