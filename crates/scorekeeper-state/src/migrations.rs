//! SurrealDB schema migrations and initialization
//!
//! Sets up the `tasks`, `submissions` and `participants` tables with their
//! indexes and permissions.

use crate::error::StateError;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all Scorekeeper tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing Scorekeeper SurrealDB schema");

    init_tasks_table(db).await?;
    init_submissions_table(db).await?;
    init_participants_table(db).await?;

    info!("Scorekeeper schema initialization complete");
    Ok(())
}

/// Initialize `tasks` table
///
/// Schema:
/// ```text
/// TABLE tasks {
///   task_id:     STRING (unique)
///   name:        STRING
///   answer_key:  OBJECT (question-id -> expected value)
///   metric:      STRING (scoring function identifier)
///   is_active:   BOOL
///   created_at:  DATETIME
/// }
/// ```
async fn init_tasks_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing tasks table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS tasks SCHEMALESS
            PERMISSIONS
                FOR select, create, update FULL,
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_task_id ON TABLE tasks COLUMNS task_id UNIQUE;
    "#;

    run(db, "tasks", sql).await?;
    info!("✓ tasks table initialized");
    Ok(())
}

/// Initialize `submissions` table
///
/// Schema:
/// ```text
/// TABLE submissions {
///   submission_id:   STRING (unique)
///   task_id:         STRING (indexed)
///   participant_id:  STRING (indexed)
///   answers:         OBJECT
///   content_digest:  STRING
///   status:          STRING (pending | scored | failed)
///   score:           FLOAT?
///   failure_reason:  STRING?
///   attempts:        INT
///   is_active:       BOOL
///   submitted_at:    DATETIME
///   scored_at:       DATETIME?
/// }
/// ```
///
/// Constraints:
/// - `status` transitions pending → scored | failed, guarded by the
///   conditional update in the store
/// - rows are never deleted; `is_active` is the soft-delete flag
async fn init_submissions_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing submissions table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS submissions SCHEMALESS
            PERMISSIONS
                FOR select, create, update FULL,
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_submission_id ON TABLE submissions COLUMNS submission_id UNIQUE;

        -- Scoreboard and history scans
        DEFINE INDEX IF NOT EXISTS idx_task_status ON TABLE submissions COLUMNS task_id, status, is_active;
        DEFINE INDEX IF NOT EXISTS idx_task_participant ON TABLE submissions COLUMNS task_id, participant_id;

        -- Pending recovery
        DEFINE INDEX IF NOT EXISTS idx_status_submitted_at ON TABLE submissions COLUMNS status, submitted_at;
    "#;

    run(db, "submissions", sql).await?;
    info!("✓ submissions table initialized");
    Ok(())
}

/// Initialize `participants` table
async fn init_participants_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing participants table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS participants SCHEMALESS
            PERMISSIONS
                FOR select, create, update FULL,
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_participant_id ON TABLE participants COLUMNS participant_id UNIQUE;
    "#;

    run(db, "participants", sql).await?;
    info!("✓ participants table initialized");
    Ok(())
}

async fn run(db: &Surreal<Any>, table: &str, sql: &str) -> Result<()> {
    db.query(sql)
        .await
        .and_then(|response| response.check())
        .map(|_| ())
        .map_err(|e| StateError::SchemaSetup(format!("{table}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Surreal<Any> {
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        db.use_ns("scorekeeper").use_db("main").await.unwrap();
        db
    }

    #[tokio::test]
    async fn init_schema_is_idempotent() {
        let db = memory_db().await;
        init_schema(&db).await.unwrap();
        init_schema(&db).await.unwrap();

        db.query("CREATE participants SET participant_id = 'p1'")
            .await
            .unwrap()
            .check()
            .unwrap();
    }

    #[tokio::test]
    async fn unique_index_rejects_duplicate_task_id() {
        let db = memory_db().await;
        init_schema(&db).await.unwrap();

        db.query("CREATE tasks SET task_id = 't1'")
            .await
            .unwrap()
            .check()
            .unwrap();
        let second = db
            .query("CREATE tasks SET task_id = 't1'")
            .await
            .unwrap()
            .check();
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn schema_errors_name_the_table() {
        // no namespace selected
        let db = surrealdb::engine::any::connect("mem://").await.unwrap();
        match init_schema(&db).await {
            Err(StateError::SchemaSetup(msg)) => assert!(msg.starts_with("tasks:"), "{msg}"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
