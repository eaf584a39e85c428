//! REST endpoints for proposals and their onboarding step.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::onboarding::OnboardingStep;
use crate::store::{Database, Proposal};
use crate::validation::{ApiResponse, FieldError, validate_new_proposal};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
}

/// Build the portal router.
pub fn portal_routes(db: Arc<dyn Database>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/save-proposal", post(save_proposal))
        .route("/api/proposals/{id}", get(get_proposal))
        .route("/api/proposals/{id}/onboarding", patch(update_onboarding))
        .with_state(AppState { db })
}

/// Body returned after a proposal is created.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProposalSaved {
    success: bool,
    message: &'static str,
    proposal_id: String,
    proposal: Proposal,
}

const PROPOSAL_SAVED_MESSAGE: &str = "Proposition sauvegardée avec succès";

/// Onboarding fields echoed back after a step update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OnboardingUpdated {
    id: String,
    onboarding_step: OnboardingStep,
    status: String,
    email: String,
}

fn failure(status: StatusCode, field: &str, message: &str) -> Response {
    (
        status,
        Json(ApiResponse::<()>::failure(vec![FieldError::new(field, message)])),
    )
        .into_response()
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "portal-onboarding"
    }))
}

// ── Proposals ───────────────────────────────────────────────────────────

/// GET /api/proposals/{id}
async fn get_proposal(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    const ROUTE: &str = "/api/proposals/{id}";
    let start = Instant::now();
    debug!(route = ROUTE, proposal_id = %id, "Fetching proposal");

    match state.db.get_proposal(&id).await {
        Ok(Some(proposal)) => {
            info!(route = ROUTE, proposal_id = %id, duration_ms = elapsed_ms(start), "Proposal fetched");
            Json(proposal).into_response()
        }
        Ok(None) => {
            warn!(route = ROUTE, proposal_id = %id, "Proposal not found");
            (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Proposal not found"})),
            )
                .into_response()
        }
        Err(e) => {
            error!(route = ROUTE, proposal_id = %id, duration_ms = elapsed_ms(start), "Failed to fetch proposal: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Internal server error"})),
            )
                .into_response()
        }
    }
}

/// POST /api/save-proposal
async fn save_proposal(State(state): State<AppState>, body: Bytes) -> Response {
    const ROUTE: &str = "/api/save-proposal";
    let start = Instant::now();
    debug!(route = ROUTE, "Processing new proposal request");

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        warn!(route = ROUTE, "Invalid JSON body");
        return failure(StatusCode::BAD_REQUEST, "body", "Invalid JSON body");
    };

    let input = match validate_new_proposal(&body) {
        Ok(input) => input,
        Err(errors) => {
            warn!(route = ROUTE, error_count = errors.len(), "Validation failed");
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<()>::failure(errors)),
            )
                .into_response();
        }
    };

    let proposal = Proposal::new(input);
    if let Err(e) = state.db.insert_proposal(&proposal).await {
        error!(route = ROUTE, duration_ms = elapsed_ms(start), "Failed to create proposal: {e}");
        return failure(
            StatusCode::INTERNAL_SERVER_ERROR,
            "server",
            "Internal server error",
        );
    }

    info!(
        route = ROUTE,
        proposal_id = %proposal.id,
        duration_ms = elapsed_ms(start),
        "Proposal created"
    );
    (
        StatusCode::CREATED,
        Json(ProposalSaved {
            success: true,
            message: PROPOSAL_SAVED_MESSAGE,
            proposal_id: proposal.id.clone(),
            proposal,
        }),
    )
        .into_response()
}

// ── Onboarding ──────────────────────────────────────────────────────────

/// PATCH /api/proposals/{id}/onboarding — body `{ "step": n }`.
async fn update_onboarding(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Response {
    const ROUTE: &str = "/api/proposals/{id}/onboarding";
    let start = Instant::now();
    debug!(route = ROUTE, proposal_id = %id, "Updating onboarding step");

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        warn!(route = ROUTE, proposal_id = %id, "Invalid JSON body");
        return failure(StatusCode::BAD_REQUEST, "body", "Invalid JSON body");
    };

    let raw_step = match body.get("step") {
        None | Some(Value::Null) => {
            warn!(route = ROUTE, proposal_id = %id, %body, "Missing step parameter");
            return failure(StatusCode::BAD_REQUEST, "step", "Step is required");
        }
        Some(raw) => raw,
    };

    let step = match OnboardingStep::from_json(raw_step) {
        Ok(step) => step,
        Err(e) => {
            warn!(route = ROUTE, proposal_id = %id, "Invalid step value: {e}");
            return failure(
                StatusCode::BAD_REQUEST,
                "step",
                "Step must be an integer between 0 and 6",
            );
        }
    };

    let existing = match state.db.get_onboarding_step(&id).await {
        Ok(Some(existing)) => existing,
        Ok(None) => {
            warn!(route = ROUTE, proposal_id = %id, "Proposal not found");
            return failure(StatusCode::NOT_FOUND, "id", "Proposal not found");
        }
        Err(e) => {
            error!(route = ROUTE, proposal_id = %id, duration_ms = elapsed_ms(start), "Failed to update onboarding step: {e}");
            return failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server",
                "Internal server error",
            );
        }
    };
    if step.index() < existing {
        debug!(
            route = ROUTE,
            proposal_id = %id,
            current_step = existing,
            new_step = step.index(),
            "Allowing backtracking in onboarding steps"
        );
    }

    match state.db.update_onboarding_step(&id, step).await {
        Ok(Some(updated)) => {
            info!(
                route = ROUTE,
                proposal_id = %id,
                new_step = step.index(),
                duration_ms = elapsed_ms(start),
                "Onboarding step updated"
            );
            Json(ApiResponse::success(OnboardingUpdated {
                id: updated.id,
                onboarding_step: updated.onboarding_step,
                status: updated.status,
                email: updated.email,
            }))
            .into_response()
        }
        // Deleted between the existence check and the write.
        Ok(None) => {
            warn!(route = ROUTE, proposal_id = %id, "Proposal not found");
            failure(StatusCode::NOT_FOUND, "id", "Proposal not found")
        }
        Err(e) => {
            error!(route = ROUTE, proposal_id = %id, duration_ms = elapsed_ms(start), "Failed to update onboarding step: {e}");
            failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                "server",
                "Internal server error",
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;
    use crate::store::{LibSqlBackend, NewProposal};

    async fn setup() -> (Router, Arc<dyn Database>, Proposal) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let proposal = Proposal::new(NewProposal {
            project_name: "E-commerce".into(),
            email: "contact@techcorp.example.com".into(),
            description: "Platform migration".into(),
            ..Default::default()
        });
        db.insert_proposal(&proposal).await.unwrap();
        (portal_routes(Arc::clone(&db)), db, proposal)
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_ok() {
        let (app, _db, _p) = setup().await;
        let (status, json) = send(app, Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn get_proposal_found_and_missing() {
        let (app, _db, proposal) = setup().await;
        let (status, json) = send(
            app.clone(),
            Method::GET,
            &format!("/api/proposals/{}", proposal.id),
            "",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["id"], proposal.id.as_str());
        assert_eq!(json["onboardingStep"], 0);
        assert_eq!(json["projectName"], "E-commerce");

        let (status, json) = send(app, Method::GET, "/api/proposals/ghost", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Proposal not found");
    }

    #[tokio::test]
    async fn patch_updates_step() {
        let (app, db, proposal) = setup().await;
        let uri = format!("/api/proposals/{}/onboarding", proposal.id);
        let (status, json) = send(app, Method::PATCH, &uri, r#"{"step": 4}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["onboardingStep"], 4);
        assert_eq!(json["data"]["status"], "pending");
        assert_eq!(json["data"]["email"], "contact@techcorp.example.com");

        let stored = db.get_onboarding_step(&proposal.id).await.unwrap();
        assert_eq!(stored, Some(4));
    }

    #[tokio::test]
    async fn patch_allows_backtracking() {
        let (app, db, proposal) = setup().await;
        db.update_onboarding_step(&proposal.id, OnboardingStep::PaymentInitiated)
            .await
            .unwrap();
        let uri = format!("/api/proposals/{}/onboarding", proposal.id);
        let (status, json) = send(app, Method::PATCH, &uri, r#"{"step": 2}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["onboardingStep"], 2);
    }

    #[tokio::test]
    async fn patch_validation_errors() {
        let (app, db, proposal) = setup().await;
        let uri = format!("/api/proposals/{}/onboarding", proposal.id);

        let cases = [
            ("not json", "body", "Invalid JSON body"),
            ("{}", "step", "Step is required"),
            (r#"{"step": null}"#, "step", "Step is required"),
            (r#"{"step": 7}"#, "step", "Step must be an integer between 0 and 6"),
            (r#"{"step": -1}"#, "step", "Step must be an integer between 0 and 6"),
            (r#"{"step": 3.5}"#, "step", "Step must be an integer between 0 and 6"),
            (r#"{"step": "two"}"#, "step", "Step must be an integer between 0 and 6"),
        ];
        for (body, field, message) in cases {
            let (status, json) = send(app.clone(), Method::PATCH, &uri, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(json["success"], false);
            assert_eq!(json["errors"][0]["field"], field, "body {body}");
            assert_eq!(json["errors"][0]["message"], message, "body {body}");
        }

        // Nothing was written.
        assert_eq!(db.get_onboarding_step(&proposal.id).await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn patch_missing_proposal() {
        let (app, _db, _p) = setup().await;
        let (status, json) = send(
            app,
            Method::PATCH,
            "/api/proposals/ghost/onboarding",
            r#"{"step": 1}"#,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["errors"][0]["field"], "id");
        assert_eq!(json["errors"][0]["message"], "Proposal not found");
    }

    #[tokio::test]
    async fn save_proposal_creates_pending_proposal() {
        let (app, db, _p) = setup().await;
        let body = r#"{
            "projectName": "Mobile banking app",
            "description": "Native iOS and Android client for retail banking",
            "email": "cto@bank.example.com",
            "company": "<Bank>",
            "features": ["Auth", "Payments"],
            "price": "120000"
        }"#;
        let (status, json) = send(app, Method::POST, "/api/save-proposal", body).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], PROPOSAL_SAVED_MESSAGE);
        assert_eq!(json["proposal"]["company"], "Bank");
        assert_eq!(json["proposal"]["onboardingStep"], 0);
        assert_eq!(json["proposal"]["status"], "pending");
        assert_eq!(json["proposal"]["price"], 120000);

        let id = json["proposalId"].as_str().unwrap();
        assert_eq!(json["proposal"]["id"], id);
        let stored = db.get_proposal(id).await.unwrap().unwrap();
        assert_eq!(stored.project_name, "Mobile banking app");
        assert_eq!(stored.features, vec!["Auth", "Payments"]);
        assert_eq!(stored.price, 120000);
    }

    #[tokio::test]
    async fn save_proposal_rejects_invalid() {
        let (app, _db, _p) = setup().await;
        let (status, json) = send(
            app.clone(),
            Method::POST,
            "/api/save-proposal",
            r#"{"projectName": "x", "email": "bad"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["errors"].as_array().unwrap().len(), 3);

        let (status, json) = send(app, Method::POST, "/api/save-proposal", "{").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["errors"][0]["field"], "body");
    }
}
