//! Form posts of the point-of-sale pages on the website.
//!
//! The kiosk session lives in the website's session cookie, so one client
//! with a cookie store is kept for the kiosk's lifetime.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::{BackendConfig, PosConfig};

/// Body class of the success page when the buyer won a free cookie
const FREE_COOKIE_MARKER: &str = "free-cookie-winner";

#[derive(Debug, Error)]
pub enum PosError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("website returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("no login status URL configured")]
    NoStatusUrl,
}

/// Answer of the login status check
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LoginStatus {
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Pending,
    LoggedIn,
    Error(String),
}

impl From<LoginStatus> for LoginOutcome {
    fn from(status: LoginStatus) -> Self {
        if status.error {
            LoginOutcome::Error(status.message)
        } else if status.status {
            LoginOutcome::LoggedIn
        } else {
            LoginOutcome::Pending
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutOutcome {
    pub free_cookie: bool,
}

/// Why the kiosk session ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutReason {
    Done,
    Timeout,
    Cancelled,
    Error(String),
}

impl LogoutReason {
    /// Query parameters of the logout page that pick the message shown after
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            LogoutReason::Done => Vec::new(),
            LogoutReason::Timeout => vec![("msg_preset", "timeout".to_string())],
            LogoutReason::Cancelled => vec![("msg_preset", "cancelled".to_string())],
            LogoutReason::Error(message) => vec![
                ("msg", message.clone()),
                ("msg_type", "ERROR".to_string()),
            ],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutReason::Done => "done",
            LogoutReason::Timeout => "timeout",
            LogoutReason::Cancelled => "cancelled",
            LogoutReason::Error(_) => "error",
        }
    }
}

#[async_trait]
pub trait PosBackend: Send + Sync {
    async fn submit_rfid_login(&self, tags: &[String]) -> Result<(), PosError>;

    async fn login_status(&self) -> Result<LoginOutcome, PosError>;

    /// `cart` is the checkout JSON of the shopping cart
    async fn submit_checkout(&self, cart: &str) -> Result<CheckoutOutcome, PosError>;

    async fn logout(&self, reason: &LogoutReason) -> Result<(), PosError>;
}

pub struct PosClient {
    client: reqwest::Client,
    rfid_login_url: String,
    checkout_url: String,
    logout_url: String,
    token_check_url: Option<String>,
}

impl PosClient {
    pub fn new(backend: &BackendConfig, pos: &PosConfig) -> Result<Self, PosError> {
        Self::with_timeout(backend, pos, backend.timeout())
    }

    pub fn with_timeout(
        backend: &BackendConfig,
        pos: &PosConfig,
        timeout: Duration,
    ) -> Result<Self, PosError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;
        Ok(Self {
            client,
            rfid_login_url: backend.url(&pos.rfid_login_path),
            checkout_url: backend.url(&pos.checkout_path),
            logout_url: backend.url(&pos.logout_path),
            token_check_url: pos.token_check_path.as_deref().map(|p| backend.url(p)),
        })
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response, PosError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(PosError::Status(response.status()))
        }
    }
}

/// `["02,04a2b3c4"]`, the value of the login form's `tags` field
pub fn tags_field(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl PosBackend for PosClient {
    async fn submit_rfid_login(&self, tags: &[String]) -> Result<(), PosError> {
        let tags = tags_field(tags);
        debug!(url = %self.rfid_login_url, tags = %tags, "Submitting RFID login");
        let response = self
            .client
            .post(&self.rfid_login_url)
            .form(&[("tags", tags)])
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }

    async fn login_status(&self) -> Result<LoginOutcome, PosError> {
        let url = self.token_check_url.as_ref().ok_or(PosError::NoStatusUrl)?;
        let response = Self::check(self.client.get(url).send().await?)?;
        let status: LoginStatus = response.json().await?;
        debug!(?status, "Login status");
        Ok(status.into())
    }

    async fn submit_checkout(&self, cart: &str) -> Result<CheckoutOutcome, PosError> {
        debug!(url = %self.checkout_url, cart = %cart, "Submitting checkout");
        let response = self
            .client
            .post(&self.checkout_url)
            .form(&[("cart", cart)])
            .send()
            .await?;
        let body = Self::check(response)?.text().await?;
        Ok(CheckoutOutcome {
            free_cookie: body.contains(FREE_COOKIE_MARKER),
        })
    }

    async fn logout(&self, reason: &LogoutReason) -> Result<(), PosError> {
        let response = self
            .client
            .get(&self.logout_url)
            .query(&reason.query())
            .send()
            .await?;
        Self::check(response)?;
        Ok(())
    }
}
