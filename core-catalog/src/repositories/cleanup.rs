//! Cleanup procedure
//!
//! Runs inside the caller's transaction:
//! 1. delete streams whose provider no longer exists
//! 2. collect ids of streams that share `(user_id, stream_uri)` with a newer
//!    row into `stream_cleanup_work`, then delete them (the highest id survives)
//! 3. empty the working table
//!
//! Duplicates are scoped to one owner: two users may hold the same
//! `stream_uri` and both rows survive. Only rows of the same user sharing a
//! URI collapse to the highest id.
//!
//! Rows are deleted directly rather than passed through
//! [`StreamState::transition_to`](crate::models::StreamState::transition_to);
//! a deleted row is the `Removed` state.

use crate::error::Result;
use crate::models::CleanupReport;
use sqlx::{query, Sqlite, Transaction};
use tracing::{debug, info};

pub(crate) async fn run(tx: &mut Transaction<'_, Sqlite>) -> Result<CleanupReport> {
    let orphans = query("DELETE FROM streams WHERE provider_id NOT IN (SELECT id FROM providers)")
        .execute(&mut **tx)
        .await?
        .rows_affected();
    debug!(orphans, "Removed orphaned streams");

    // Leftovers from an interrupted run would otherwise be deleted below.
    query("DELETE FROM stream_cleanup_work")
        .execute(&mut **tx)
        .await?;

    query(
        r#"
        INSERT INTO stream_cleanup_work (id)
        SELECT older.id
        FROM streams older
        WHERE EXISTS (
            SELECT 1 FROM streams newer
            WHERE newer.user_id = older.user_id
              AND newer.stream_uri = older.stream_uri
              AND newer.id > older.id
        )
        "#,
    )
    .execute(&mut **tx)
    .await?;

    let duplicates = query("DELETE FROM streams WHERE id IN (SELECT id FROM stream_cleanup_work)")
        .execute(&mut **tx)
        .await?
        .rows_affected();

    query("DELETE FROM stream_cleanup_work")
        .execute(&mut **tx)
        .await?;

    let report = CleanupReport {
        orphans_removed: orphans,
        duplicates_removed: duplicates,
    };
    info!(
        orphans_removed = report.orphans_removed,
        duplicates_removed = report.duplicates_removed,
        "Cleanup procedure finished"
    );
    Ok(report)
}
