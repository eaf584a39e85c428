//! Progress store — where the tracker reads and writes a proposal's step.
//!
//! `HttpProgressStore` talks to the portal REST API; `DatabaseProgressStore`
//! goes straight to a `Database` handle for in-process use.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::step::OnboardingStep;
use crate::error::ProgressError;
use crate::store::Database;

/// Fallback message when a rejected update carries no structured error.
const DEFAULT_SAVE_ERROR: &str = "Failed to save step";

const NOT_FOUND_MESSAGE: &str = "Proposal not found";

fn not_found(proposal_id: &str, message: impl Into<String>) -> ProgressError {
    ProgressError::NotFound {
        proposal_id: proposal_id.to_string(),
        message: message.into(),
    }
}

/// Backing store for a proposal's onboarding step.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch the stored step for a proposal.
    async fn fetch_step(&self, proposal_id: &str) -> Result<OnboardingStep, ProgressError>;

    /// Persist a new step for a proposal (unconditional overwrite).
    async fn update_step(
        &self,
        proposal_id: &str,
        step: OnboardingStep,
    ) -> Result<(), ProgressError>;
}

// ── HTTP ────────────────────────────────────────────────────────────

/// Progress store backed by the portal REST API.
#[derive(Clone)]
pub struct HttpProgressStore {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl HttpProgressStore {
    /// Build a client for `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProgressError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ProgressError::Network(format!("Invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProgressError::Network(format!(
                "Invalid base URL {base_url}: cannot be a base"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProgressError::Network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    fn proposal_url(&self, proposal_id: &str, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["api", "proposals", proposal_id]);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }

    fn map_err(&self, e: reqwest::Error) -> ProgressError {
        if e.is_timeout() {
            ProgressError::Timeout {
                timeout: self.timeout,
            }
        } else {
            ProgressError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn fetch_step(&self, proposal_id: &str) -> Result<OnboardingStep, ProgressError> {
        let url = self.proposal_url(proposal_id, None);
        debug!(%url, "Fetching onboarding step");

        let response = self.client.get(url).send().await.map_err(|e| self.map_err(e))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(not_found(proposal_id, NOT_FOUND_MESSAGE));
        }
        if !status.is_success() {
            return Err(ProgressError::Network(format!("HTTP {status}")));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ProgressError::Malformed {
                proposal_id: proposal_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        let raw = body.get("onboardingStep").ok_or_else(|| ProgressError::Malformed {
            proposal_id: proposal_id.to_string(),
            reason: "missing onboardingStep".to_string(),
        })?;
        OnboardingStep::from_json(raw).map_err(|e| ProgressError::Malformed {
            proposal_id: proposal_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn update_step(
        &self,
        proposal_id: &str,
        step: OnboardingStep,
    ) -> Result<(), ProgressError> {
        let url = self.proposal_url(proposal_id, Some("onboarding"));
        debug!(%url, step = step.index(), "Saving onboarding step");

        let response = self
            .client
            .patch(url)
            .json(&serde_json::json!({ "step": step }))
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // Best effort: `{ "errors": [{ "field", "message" }] }`
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| {
                body.get("errors")?
                    .get(0)?
                    .get("message")?
                    .as_str()
                    .map(String::from)
            })
            .unwrap_or_else(|| DEFAULT_SAVE_ERROR.to_string());

        if status == StatusCode::NOT_FOUND {
            Err(not_found(proposal_id, message))
        } else {
            Err(ProgressError::Rejected(message))
        }
    }
}

// ── Database ────────────────────────────────────────────────────────

/// Progress store that reads and writes the `proposals` table directly.
#[derive(Clone)]
pub struct DatabaseProgressStore {
    db: Arc<dyn Database>,
}

impl DatabaseProgressStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProgressStore for DatabaseProgressStore {
    async fn fetch_step(&self, proposal_id: &str) -> Result<OnboardingStep, ProgressError> {
        let raw = self
            .db
            .get_onboarding_step(proposal_id)
            .await?
            .ok_or_else(|| not_found(proposal_id, NOT_FOUND_MESSAGE))?;
        OnboardingStep::try_from(raw).map_err(|e| ProgressError::Malformed {
            proposal_id: proposal_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn update_step(
        &self,
        proposal_id: &str,
        step: OnboardingStep,
    ) -> Result<(), ProgressError> {
        match self.db.update_onboarding_step(proposal_id, step).await? {
            Some(_) => Ok(()),
            None => Err(not_found(proposal_id, NOT_FOUND_MESSAGE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LibSqlBackend, NewProposal, Proposal};

    #[test]
    fn proposal_urls() {
        let store = HttpProgressStore::new("http://127.0.0.1:8080", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.proposal_url("abc", None).as_str(),
            "http://127.0.0.1:8080/api/proposals/abc"
        );
        assert_eq!(
            store.proposal_url("abc", Some("onboarding")).as_str(),
            "http://127.0.0.1:8080/api/proposals/abc/onboarding"
        );

        // Base path and awkward ids are preserved / escaped.
        let store =
            HttpProgressStore::new("http://portal.example/app/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.proposal_url("a/b c", None).as_str(),
            "http://portal.example/app/api/proposals/a%2Fb%20c"
        );
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(HttpProgressStore::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpProgressStore::new("mailto:ops@example.com", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn database_store_roundtrip() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let proposal = Proposal::new(NewProposal {
            project_name: "Roundtrip".into(),
            email: "a@b.co".into(),
            ..Default::default()
        });
        db.insert_proposal(&proposal).await.unwrap();

        let store = DatabaseProgressStore::new(Arc::clone(&db));
        assert_eq!(
            store.fetch_step(&proposal.id).await.unwrap(),
            OnboardingStep::Created
        );
        store
            .update_step(&proposal.id, OnboardingStep::ReadyToSign)
            .await
            .unwrap();
        assert_eq!(
            store.fetch_step(&proposal.id).await.unwrap(),
            OnboardingStep::ReadyToSign
        );
    }

    #[tokio::test]
    async fn database_store_missing_proposal() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let store = DatabaseProgressStore::new(db);
        assert!(matches!(
            store.fetch_step("ghost").await,
            Err(ProgressError::NotFound { .. })
        ));
        let err = store
            .update_step("ghost", OnboardingStep::Validated)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotFound { .. }));
        assert_eq!(err.to_string(), "Proposal not found");
    }

    #[test]
    fn server_messages_display_verbatim() {
        let err = not_found("p1", "Proposal not found");
        assert_eq!(err.to_string(), "Proposal not found");
        let err = ProgressError::Rejected("Step must be an integer between 0 and 6".into());
        assert_eq!(err.to_string(), "Step must be an integer between 0 and 6");
    }
}
