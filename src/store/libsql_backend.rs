//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::onboarding::OnboardingStep;
use crate::store::migrations;
use crate::store::proposals::Proposal;
use crate::store::traits::Database;

/// Column list shared by every proposal SELECT; `row_to_proposal` reads in this order.
const PROPOSAL_COLUMNS: &str = "id, project_name, company, email, phone, description, \
     project_type, timeline, features, price, status, onboarding_step, valid_until, \
     created_at, updated_at";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Map a libsql Row to a Proposal. Column order matches `PROPOSAL_COLUMNS`.
fn row_to_proposal(row: &libsql::Row) -> Result<Proposal, DatabaseError> {
    let get_str = |idx: i32| -> Result<String, DatabaseError> {
        row.get::<String>(idx)
            .map_err(|e| DatabaseError::Serialization(format!("column {idx}: {e}")))
    };

    let features_json = get_str(8)?;
    let features: Vec<String> = serde_json::from_str(&features_json)
        .map_err(|e| DatabaseError::Serialization(format!("features: {e}")))?;

    let price: i64 = row
        .get(9)
        .map_err(|e| DatabaseError::Serialization(format!("price: {e}")))?;

    let raw_step: i64 = row
        .get(11)
        .map_err(|e| DatabaseError::Serialization(format!("onboarding_step: {e}")))?;
    let onboarding_step = OnboardingStep::try_from(raw_step)
        .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

    Ok(Proposal {
        id: get_str(0)?,
        project_name: get_str(1)?,
        company: get_str(2)?,
        email: get_str(3)?,
        phone: get_str(4)?,
        description: get_str(5)?,
        project_type: get_str(6)?,
        timeline: get_str(7)?,
        features,
        price,
        status: get_str(10)?,
        onboarding_step,
        valid_until: parse_datetime(&get_str(12)?),
        created_at: parse_datetime(&get_str(13)?),
        updated_at: parse_datetime(&get_str(14)?),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Proposals ───────────────────────────────────────────────────

    async fn insert_proposal(&self, proposal: &Proposal) -> Result<(), DatabaseError> {
        let features = serde_json::to_string(&proposal.features)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO proposals ({PROPOSAL_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
                ),
                params![
                    proposal.id.clone(),
                    proposal.project_name.clone(),
                    proposal.company.clone(),
                    proposal.email.clone(),
                    proposal.phone.clone(),
                    proposal.description.clone(),
                    proposal.project_type.clone(),
                    proposal.timeline.clone(),
                    features,
                    proposal.price,
                    proposal.status.clone(),
                    proposal.onboarding_step.index(),
                    proposal.valid_until.to_rfc3339(),
                    proposal.created_at.to_rfc3339(),
                    proposal.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE") || msg.contains("CHECK") {
                    DatabaseError::Constraint(format!("insert_proposal: {msg}"))
                } else {
                    DatabaseError::Query(format!("insert_proposal: {msg}"))
                }
            })?;

        debug!(proposal_id = %proposal.id, "Proposal inserted");
        Ok(())
    }

    async fn get_proposal(&self, id: &str) -> Result<Option<Proposal>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_proposal: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_proposal(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_proposal: {e}"))),
        }
    }

    async fn get_onboarding_step(&self, id: &str) -> Result<Option<i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT onboarding_step FROM proposals WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_onboarding_step: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let step: i64 = row
                    .get(0)
                    .map_err(|e| DatabaseError::Serialization(format!("onboarding_step: {e}")))?;
                Ok(Some(step))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_onboarding_step: {e}"))),
        }
    }

    async fn update_onboarding_step(
        &self,
        id: &str,
        step: OnboardingStep,
    ) -> Result<Option<Proposal>, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE proposals SET onboarding_step = ?1, updated_at = ?2 WHERE id = ?3",
                params![step.index(), now, id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_onboarding_step: {e}")))?;

        if count == 0 {
            return Ok(None);
        }
        debug!(proposal_id = %id, step = step.index(), "Onboarding step written");
        self.get_proposal(id).await
    }
}
