//! Proposal model — the record that carries a client's onboarding step.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::onboarding::OnboardingStep;

/// Status given to freshly created proposals.
pub const DEFAULT_STATUS: &str = "pending";

/// Proposals stay valid for 30 days after creation.
pub const VALIDITY_DAYS: i64 = 30;

/// A client's project proposal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: String,
    pub project_name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub description: String,
    pub project_type: String,
    pub timeline: String,
    pub features: Vec<String>,
    /// Price in cents.
    pub price: i64,
    pub status: String,
    pub onboarding_step: OnboardingStep,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating a proposal.
#[derive(Debug, Clone, Default)]
pub struct NewProposal {
    pub project_name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    pub description: String,
    pub project_type: String,
    pub timeline: String,
    pub features: Vec<String>,
    pub price: i64,
}

impl Proposal {
    /// Create a proposal at step 0 with a fresh id and a 30-day validity window.
    pub fn new(input: NewProposal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            project_name: input.project_name,
            company: input.company,
            email: input.email,
            phone: input.phone,
            description: input.description,
            project_type: input.project_type,
            timeline: input.timeline,
            features: input.features,
            price: input.price,
            status: DEFAULT_STATUS.to_string(),
            onboarding_step: OnboardingStep::Created,
            valid_until: now + Duration::days(VALIDITY_DAYS),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_proposal_defaults() {
        let p = Proposal::new(NewProposal {
            project_name: "Shop migration".into(),
            email: "ops@example.com".into(),
            ..Default::default()
        });
        assert_eq!(p.onboarding_step, OnboardingStep::Created);
        assert_eq!(p.status, "pending");
        assert_eq!((p.valid_until - p.created_at).num_days(), 30);
        assert!(Uuid::parse_str(&p.id).is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let mut p = Proposal::new(NewProposal::default());
        p.onboarding_step = OnboardingStep::ContractSigned;
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["onboardingStep"], 4);
        assert!(json.get("projectName").is_some());
        assert!(json.get("validUntil").is_some());
    }
}
