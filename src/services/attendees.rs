// Attendee service: attendee-level merge and the attendee duplicate scan.

use serde_json::json;

use crate::audit::{self, AuditContext, ACTION_ATTENDEE_MERGE};
use crate::db::{AttendeeMergeResult, RecordsDb};
use crate::duplicates::{self, DuplicatePair};
use crate::entity::SearchEntityType;
use crate::error::IdentityError;
use crate::services::search::reindex_after_commit;
use crate::types::Config;

/// Merge Attendee `source_id` into `target_id`.
///
/// The source stays on record, redirected to the target. Both must exist,
/// differ, and still be active; every violated condition is reported.
pub fn merge_attendee(
    db: &RecordsDb,
    ctx: &AuditContext,
    source_id: i64,
    target_id: i64,
) -> Result<AttendeeMergeResult, IdentityError> {
    let source = db.get_attendee(source_id)?;
    let target = db.get_attendee(target_id)?;

    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    if source.is_none() {
        missing.push(format!("Source attendee {source_id} does not exist"));
    }
    if target.is_none() {
        missing.push(format!("Target attendee {target_id} does not exist"));
    }
    if source_id == target_id {
        invalid.push("Cannot merge an attendee into itself".to_string());
    }
    if let Some(merged_into) = source.as_ref().and_then(|a| a.state.merged_into()) {
        invalid.push(format!(
            "Source attendee {source_id} is already merged into {merged_into}"
        ));
    }
    if let Some(merged_into) = target.as_ref().and_then(|a| a.state.merged_into()) {
        invalid.push(format!(
            "Target attendee {target_id} is already merged into {merged_into}"
        ));
    }
    let (Some(source), Some(target)) = (source, target) else {
        missing.extend(invalid);
        return Err(IdentityError::NotFound(missing));
    };
    if !invalid.is_empty() {
        return Err(IdentityError::Validation(invalid));
    }

    let result = db.merge_attendees(source_id, target_id)?;

    reindex_after_commit(db, SearchEntityType::Person, target.person_id);
    if source.person_id != target.person_id {
        reindex_after_commit(db, SearchEntityType::Person, source.person_id);
    }

    audit::record(
        db,
        ctx,
        ACTION_ATTENDEE_MERGE,
        json!({
            "sourceId": source_id,
            "sourceName": source.name,
            "targetId": target_id,
            "targetName": target.name,
            "targetAppearancesBefore": result.target_appearances_before,
            "targetAppearancesAfter": result.target_appearances_after,
            "governingBodies": result.governing_bodies,
        }),
    );
    log::info!(
        "Merged attendee {} ('{}') into {} ('{}')",
        source_id,
        source.name,
        target_id,
        target.name
    );
    Ok(result)
}

/// Candidate duplicate pairs among active attendees, using the configured
/// tolerance. Nothing is stored.
pub fn find_attendee_duplicates(
    db: &RecordsDb,
    config: &Config,
) -> Result<Vec<DuplicatePair>, IdentityError> {
    Ok(duplicates::detect_attendee_duplicates(
        db,
        config.duplicate_similarity_percent,
    )?)
}
