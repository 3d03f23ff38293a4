//! Hand anonymous documents to a newly signed-in owner.

use crate::db::DocumentRepository;
use crate::error::Result;

/// Assign every live anonymous document to `owner_id`.
///
/// Run once per new session, before its first sync cycle, so the migrated
/// documents are pushed as dirty. Returns the number migrated.
pub async fn migrate_anonymous_documents(
    local: &dyn DocumentRepository,
    owner_id: &str,
) -> Result<usize> {
    let migrated = local.migrate_ownership(owner_id).await?;
    if migrated > 0 {
        tracing::info!("Assigned {migrated} anonymous documents to {owner_id}");
    }
    Ok(migrated)
}
