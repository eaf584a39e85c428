//! Client portal onboarding — proposal step tracking with debounced persistence.

pub mod config;
pub mod error;
pub mod onboarding;
pub mod routes;
pub mod store;
pub mod validation;
