//! Onboarding — a proposal's position in the proposal → payment workflow.
//!
//! `OnboardingStep` is the validated step value. `StepTracker` keeps one
//! proposal's step in memory with debounced persistence through a
//! `ProgressStore` (HTTP API or direct database).

pub mod client;
pub mod step;
pub mod tracker;

pub use client::{DatabaseProgressStore, HttpProgressStore, ProgressStore};
pub use step::{InvalidStep, OnboardingStep};
pub use tracker::{StepTracker, TrackerSnapshot};
