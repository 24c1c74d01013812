// People service: Person-level merge, unmerge, rename and delete, plus the
// duplicate review surface. Validation, audit and search upkeep sit here;
// the storage layer owns the transactions.

use serde_json::json;

use crate::audit::{self, AuditContext, ACTION_ATTENDEE_UNMERGE, ACTION_DUPLICATE_DETECTION, ACTION_PERSON_MERGE};
use crate::clusters::{self, DuplicateGroup};
use crate::db::{PersonMergeResult, RecordsDb, UnmergeResult};
use crate::duplicates::{self, DetectionSummary};
use crate::entity::SearchEntityType;
use crate::error::IdentityError;
use crate::services::search::reindex_after_commit;
use crate::types::Config;

/// Merge Person `source_id` into `target_id`.
///
/// Every problem with the request is reported at once; a missing record
/// makes the whole failure a NotFound. Suggestions mentioning the source are
/// dropped before the merge since they would dangle afterwards.
pub fn merge_person(
    db: &RecordsDb,
    ctx: &AuditContext,
    source_id: i64,
    target_id: i64,
) -> Result<PersonMergeResult, IdentityError> {
    let source = db.get_person(source_id)?;
    let target = db.get_person(target_id)?;

    let mut missing = Vec::new();
    let mut invalid = Vec::new();
    if source.is_none() {
        missing.push(format!("Source person {source_id} does not exist"));
    }
    if target.is_none() {
        missing.push(format!("Target person {target_id} does not exist"));
    }
    if source_id == target_id {
        invalid.push("Cannot merge a person into itself".to_string());
    }
    let (Some(source), Some(target)) = (source, target) else {
        missing.extend(invalid);
        return Err(IdentityError::NotFound(missing));
    };
    if !invalid.is_empty() {
        return Err(IdentityError::Validation(invalid));
    }

    db.delete_suggestions_for_person(source_id)?;
    let result = db.merge_people(source_id, target_id)?;

    reindex_after_commit(db, SearchEntityType::Person, source_id);
    reindex_after_commit(db, SearchEntityType::Person, target_id);

    audit::record(
        db,
        ctx,
        ACTION_PERSON_MERGE,
        json!({
            "sourceId": source_id,
            "sourceName": source.name,
            "targetId": target_id,
            "targetName": target.name,
            "attendeesMoved": result.attendees_moved,
            "sourceAppearances": result.source_appearances,
            "targetAppearancesBefore": result.target_appearances_before,
            "targetAppearancesAfter": result.target_appearances_after,
        }),
    );
    log::info!(
        "Merged person {} ('{}') into {} ('{}'): {} attendees moved",
        source_id,
        source.name,
        target_id,
        target.name,
        result.attendees_moved
    );
    Ok(result)
}

/// Split one attendee out of its Person into a new Person.
pub fn unmerge_attendee(
    db: &RecordsDb,
    ctx: &AuditContext,
    attendee_id: i64,
) -> Result<UnmergeResult, IdentityError> {
    let attendee = db
        .get_attendee(attendee_id)?
        .ok_or_else(|| IdentityError::not_found(format!("Attendee {attendee_id} does not exist")))?;
    if db.count_person_attendees(attendee.person_id)? <= 1 {
        return Err(IdentityError::validation(format!(
            "Attendee '{}' is the only identity of its person and cannot be split off",
            attendee.name
        )));
    }

    let result = db.unmerge_attendee(attendee_id)?;

    reindex_after_commit(db, SearchEntityType::Person, result.original_person_id);
    reindex_after_commit(db, SearchEntityType::Person, result.new_person_id);

    audit::record(
        db,
        ctx,
        ACTION_ATTENDEE_UNMERGE,
        json!({
            "attendeeId": attendee_id,
            "attendeeName": attendee.name,
            "originalPersonId": result.original_person_id,
            "newPersonId": result.new_person_id,
            "originalAppearancesAfter": result.original_appearances_after,
            "newAppearances": result.new_appearances,
        }),
    );
    log::info!(
        "Split attendee {} out of person {} into new person {}",
        attendee_id,
        result.original_person_id,
        result.new_person_id
    );
    Ok(result)
}

/// Rename a person; the normalized name follows.
pub fn rename_person(db: &RecordsDb, person_id: i64, name: &str) -> Result<(), IdentityError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IdentityError::validation("Name cannot be blank"));
    }
    if db.get_person(person_id)?.is_none() {
        return Err(IdentityError::not_found(format!("Person {person_id} does not exist")));
    }
    db.rename_person(person_id, name)?;
    reindex_after_commit(db, SearchEntityType::Person, person_id);
    Ok(())
}

/// Delete a person with no remaining attendees.
pub fn delete_person(db: &RecordsDb, person_id: i64) -> Result<(), IdentityError> {
    if db.get_person(person_id)?.is_none() {
        return Err(IdentityError::not_found(format!("Person {person_id} does not exist")));
    }
    db.delete_person(person_id)?;
    reindex_after_commit(db, SearchEntityType::Person, person_id);
    Ok(())
}

/// Rebuild duplicate suggestions with the configured tolerance.
pub fn detect_duplicates(
    db: &RecordsDb,
    config: &Config,
    ctx: &AuditContext,
) -> Result<DetectionSummary, IdentityError> {
    let summary = duplicates::detect_duplicates(db, config.duplicate_similarity_percent)?;
    audit::record(
        db,
        ctx,
        ACTION_DUPLICATE_DETECTION,
        json!({
            "similarityPercent": config.duplicate_similarity_percent,
            "recordsScanned": summary.records_scanned,
            "exactPairs": summary.exact_pairs,
            "similarPairs": summary.similar_pairs,
        }),
    );
    Ok(summary)
}

/// Duplicate clusters for review, optionally limited to one town.
pub fn list_duplicate_groups(
    db: &RecordsDb,
    town_id: Option<i64>,
) -> Result<Vec<DuplicateGroup>, IdentityError> {
    Ok(clusters::list_duplicate_groups(db, town_id)?)
}
