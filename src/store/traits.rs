//! `Database` trait — async interface for proposal persistence.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::onboarding::OnboardingStep;
use crate::store::proposals::Proposal;

/// Backend-agnostic database trait.
///
/// Constructed once at process start and shared as `Arc<dyn Database>`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert a new proposal.
    async fn insert_proposal(&self, proposal: &Proposal) -> Result<(), DatabaseError>;

    /// Get a proposal by ID.
    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>, DatabaseError>;

    /// Read the raw stored onboarding step for a proposal.
    ///
    /// Returned unvalidated so callers can tell a missing proposal from a
    /// malformed value.
    async fn get_onboarding_step(&self, id: &str) -> Result<Option<i64>, DatabaseError>;

    /// Overwrite a proposal's onboarding step (last write wins).
    /// Returns the updated proposal, or `None` if it does not exist.
    async fn update_onboarding_step(
        &self,
        id: &str,
        step: OnboardingStep,
    ) -> Result<Option<Proposal>, DatabaseError>;
}
