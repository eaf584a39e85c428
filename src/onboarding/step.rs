//! Onboarding step — position of a proposal in the fixed 7-stage workflow.

use serde::{Deserialize, Serialize};

/// The stages a proposal moves through, from creation to paid project.
///
/// Progresses linearly: Created → Validated → ContractGenerated →
/// ReadyToSign → ContractSigned → PaymentInitiated → PaymentCompleted.
/// On the wire and in the database a step is its integer index (0–6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum OnboardingStep {
    Created = 0,
    Validated = 1,
    ContractGenerated = 2,
    ReadyToSign = 3,
    ContractSigned = 4,
    PaymentInitiated = 5,
    PaymentCompleted = 6,
}

/// A step value outside `[0, 6]`, or not an integer at all.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Step must be an integer between 0 and 6 (got {0})")]
pub struct InvalidStep(pub String);

impl OnboardingStep {
    pub const MIN: i64 = 0;
    pub const MAX: i64 = 6;

    /// Integer index of this step.
    pub fn index(self) -> i64 {
        self as i64
    }

    /// Validate a loosely typed value (as received in a JSON body).
    ///
    /// Accepts JSON numbers with an integral value in range; rejects
    /// fractions, strings, booleans, null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, InvalidStep> {
        let serde_json::Value::Number(n) = value else {
            return Err(InvalidStep(value.to_string()));
        };
        if let Some(i) = n.as_i64() {
            return Self::try_from(i);
        }
        match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= Self::MIN as f64 && f <= Self::MAX as f64 => {
                Self::try_from(f as i64)
            }
            _ => Err(InvalidStep(n.to_string())),
        }
    }
}

impl Default for OnboardingStep {
    fn default() -> Self {
        Self::Created
    }
}

impl TryFrom<i64> for OnboardingStep {
    type Error = InvalidStep;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Created),
            1 => Ok(Self::Validated),
            2 => Ok(Self::ContractGenerated),
            3 => Ok(Self::ReadyToSign),
            4 => Ok(Self::ContractSigned),
            5 => Ok(Self::PaymentInitiated),
            6 => Ok(Self::PaymentCompleted),
            other => Err(InvalidStep(other.to_string())),
        }
    }
}

impl From<OnboardingStep> for i64 {
    fn from(step: OnboardingStep) -> Self {
        step.index()
    }
}

impl std::fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::ContractGenerated => "contract_generated",
            Self::ReadyToSign => "ready_to_sign",
            Self::ContractSigned => "contract_signed",
            Self::PaymentInitiated => "payment_initiated",
            Self::PaymentCompleted => "payment_completed",
        };
        write!(f, "{s}")
    }
}
