// Documents service: the lifecycle hooks that keep the identity graph and
// the search index in step with document changes.

use crate::db::RecordsDb;
use crate::entity::SearchEntityType;
use crate::error::IdentityError;
use crate::processor::{complete_and_link_document, LinkSummary};
use crate::services::search::{clear_document_entries, reindex_after_commit};

/// Mark a document complete, link its attendees and index it with its
/// topics. A document that cannot be linked is refused with its status
/// untouched. Re-running on an already complete document is harmless.
pub fn process_completed_document(
    db: &RecordsDb,
    document_id: i64,
) -> Result<LinkSummary, IdentityError> {
    let summary = complete_and_link_document(db, document_id)?;

    reindex_after_commit(db, SearchEntityType::Document, document_id);
    for person_id in &summary.people_touched {
        reindex_after_commit(db, SearchEntityType::Person, *person_id);
    }
    Ok(summary)
}

/// Delete a document, its appearance links and its search entries.
/// Returns the people whose counters were recomputed.
pub fn remove_document(db: &RecordsDb, document_id: i64) -> Result<Vec<i64>, IdentityError> {
    let affected = db.delete_document(document_id)?;
    if let Err(e) = clear_document_entries(db, document_id) {
        log::warn!(
            "Clearing search entries for deleted document {} failed: {}",
            document_id,
            e
        );
    }
    for person_id in &affected {
        reindex_after_commit(db, SearchEntityType::Person, *person_id);
    }
    log::info!(
        "Removed document {} ({} people recounted)",
        document_id,
        affected.len()
    );
    Ok(affected)
}

/// Rename a governing body, moving its attendees to the new name, and
/// refresh every index entry that shows the name. Returns the number of
/// documents reindexed.
pub fn rename_governing_body(
    db: &RecordsDb,
    body_id: i64,
    name: &str,
) -> Result<usize, IdentityError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(IdentityError::validation("Governing body name cannot be blank"));
    }
    if db.get_governing_body(body_id)?.is_none() {
        return Err(IdentityError::not_found(format!(
            "Governing body {body_id} does not exist"
        )));
    }
    let people = db.rename_governing_body(body_id, name)?;

    reindex_after_commit(db, SearchEntityType::GoverningBody, body_id);
    for person_id in &people {
        reindex_after_commit(db, SearchEntityType::Person, *person_id);
    }
    let documents = db.get_documents_for_governing_body(body_id)?;
    for doc in &documents {
        reindex_after_commit(db, SearchEntityType::Document, doc.id);
    }
    Ok(documents.len())
}
