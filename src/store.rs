//! Hosted document store, reached over its REST interface.
//!
//! The store may or may not be configured for a deployment. Rather than a
//! process-wide flag, callers get a [`StoreHandle`] and ask it whether it is
//! usable before every read.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1/accounts:sendOobCode";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document store disabled: {0}")]
    Disabled(String),
    #[error("document store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("document store answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("reset links need an identity API key")]
    MissingApiKey,
    #[error("identity service returned no reset link for {0}")]
    NoLink(String),
}

#[derive(Debug, Clone)]
pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    auth: Option<String>,
    api_key: Option<String>,
    identity_url: String,
}

impl FirebaseStore {
    pub fn new(
        base_url: impl Into<String>,
        auth: Option<String>,
        api_key: Option<String>,
    ) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("moveeasy/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            api_key,
            identity_url: IDENTITY_TOOLKIT_URL.to_string(),
        })
    }

    /// Point reset-link requests somewhere other than the hosted identity service.
    pub fn with_identity_url(mut self, url: impl Into<String>) -> Self {
        self.identity_url = url.into();
        self
    }

    fn document_url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(secret) => request.query(&[("auth", secret)]),
            None => request,
        }
    }

    /// Read the document at `path`. The store answers JSON `null` for missing paths.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let url = self.document_url(path);
        debug!(%url, "Reading document");
        let response = self.with_auth(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        let value: Value = response.json().await?;
        Ok((!value.is_null()).then_some(value))
    }

    /// Replace the document at `path`.
    pub async fn put(&self, path: &str, value: &Value) -> Result<(), StoreError> {
        let url = self.document_url(path);
        let response = self
            .with_auth(self.client.put(&url))
            .json(value)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        info!(%url, "Wrote document");
        Ok(())
    }

    pub async fn password_reset_link(&self, email: &str) -> Result<String, StoreError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct OobResponse {
            oob_link: Option<String>,
        }

        let api_key = self.api_key.as_ref().ok_or(StoreError::MissingApiKey)?;
        let response = self
            .client
            .post(&self.identity_url)
            .query(&[("key", api_key)])
            .json(&json!({
                "requestType": "PASSWORD_RESET",
                "email": email,
                "returnOobLink": true,
            }))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let parsed: OobResponse = response.json().await?;
        // Without admin credentials the service mails the link instead of returning it.
        parsed
            .oob_link
            .ok_or_else(|| StoreError::NoLink(email.to_string()))
    }
}

#[derive(Debug, Clone)]
pub enum StoreHandle {
    Connected(Arc<FirebaseStore>),
    Disabled { reason: String },
}

impl StoreHandle {
    /// Connect when a database URL is configured, otherwise come up disabled.
    pub fn from_config(
        database_url: Option<&str>,
        auth: Option<String>,
        api_key: Option<String>,
    ) -> Self {
        let Some(url) = database_url.filter(|u| !u.trim().is_empty()) else {
            warn!("Document store disabled: no database URL configured");
            return Self::disabled("no database URL configured");
        };
        match FirebaseStore::new(url, auth, api_key) {
            Ok(store) => {
                info!(url, "Document store configured");
                Self::Connected(Arc::new(store))
            }
            Err(e) => {
                warn!(error = %e, "Document store disabled");
                Self::disabled(e.to_string())
            }
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::Disabled {
            reason: reason.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn store(&self) -> Result<&FirebaseStore, StoreError> {
        match self {
            Self::Connected(store) => Ok(store),
            Self::Disabled { reason } => Err(StoreError::Disabled(reason.clone())),
        }
    }
}
