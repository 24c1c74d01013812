//! Attendee linking for completed documents.
//!
//! Reads the extracted attendee list of a document and resolves each mention
//! to an Attendee identity (creating the Person and Attendee on first sight),
//! then records the appearance on the `document_attendees` join table.

pub mod metadata;

use std::collections::BTreeSet;

use chrono::Utc;
use serde::Serialize;

use crate::db::{DbAttendee, DbError, DbGoverningBody, DocumentStatus, RecordsDb};
use crate::error::IdentityError;
use crate::normalize::normalize_name;
use metadata::{attendee_mentions, sighting_timestamp, AttendeeMention};

/// Result of linking one document's attendees.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSummary {
    pub mentions: usize,
    pub links_created: usize,
    pub attendees_created: usize,
    pub people_created: usize,
    /// People whose attendees gained links or were created.
    pub people_touched: Vec<i64>,
}

/// What linking one document needs, read and checked before any write.
struct LinkScope {
    document_id: i64,
    body: DbGoverningBody,
    town_id: i64,
    mentions: Vec<AttendeeMention>,
    seen_at: String,
}

/// Load a document for linking. A document with no governing body, or whose
/// body has no town to scope new people to, is refused.
fn link_scope(db: &RecordsDb, document_id: i64) -> Result<LinkScope, IdentityError> {
    let doc = db
        .get_document(document_id)?
        .ok_or_else(|| IdentityError::not_found(format!("Document {document_id} not found")))?;
    let body = match doc.governing_body_id {
        Some(id) => db
            .get_governing_body(id)?
            .ok_or_else(|| IdentityError::not_found(format!("Governing body {id} not found")))?,
        None => {
            return Err(IdentityError::validation(format!(
                "Document {document_id} has no governing body"
            )))
        }
    };
    let Some(town_id) = body.town_id else {
        return Err(IdentityError::validation(format!(
            "Governing body '{}' has no town",
            body.name
        )));
    };

    Ok(LinkScope {
        document_id,
        town_id,
        mentions: attendee_mentions(&doc),
        seen_at: sighting_timestamp(&doc, Utc::now()),
        body,
    })
}

/// Link every named attendee in a document's metadata, in one transaction.
pub fn link_document_attendees(db: &RecordsDb, document_id: i64) -> Result<LinkSummary, IdentityError> {
    let scope = link_scope(db, document_id)?;
    let summary = db.with_transaction(|tx| link_scoped(tx, &scope))?;
    log_summary(&scope, &summary);
    Ok(summary)
}

/// Mark a document complete and link its attendees. Both happen in one
/// transaction, after the document has passed the linking checks.
pub fn complete_and_link_document(
    db: &RecordsDb,
    document_id: i64,
) -> Result<LinkSummary, IdentityError> {
    let scope = link_scope(db, document_id)?;
    let summary = db.with_transaction(|tx| {
        tx.update_document_status(document_id, DocumentStatus::Complete)?;
        link_scoped(tx, &scope)
    })?;
    log_summary(&scope, &summary);
    Ok(summary)
}

fn link_scoped(tx: &RecordsDb, scope: &LinkScope) -> Result<LinkSummary, DbError> {
    let mut summary = LinkSummary {
        mentions: scope.mentions.len(),
        ..LinkSummary::default()
    };
    let mut touched = BTreeSet::new();
    for mention in &scope.mentions {
        let Some(attendee) = resolve_attendee(
            tx,
            &scope.body,
            scope.town_id,
            mention,
            &scope.seen_at,
            &mut summary,
        )?
        else {
            continue;
        };
        if tx.link_document_attendee(
            scope.document_id,
            attendee.id,
            mention.role.as_deref(),
            mention.status,
            mention.source_text.as_deref(),
        )? {
            summary.links_created += 1;
        }
        tx.record_attendee_sighting(attendee.id, &scope.seen_at, &scope.body.name)?;
        tx.recompute_attendee_appearances(attendee.id)?;
        touched.insert(attendee.person_id);
    }
    for person_id in &touched {
        tx.recompute_person_appearances(*person_id)?;
    }
    summary.people_touched = touched.into_iter().collect();
    Ok(summary)
}

fn log_summary(scope: &LinkScope, summary: &LinkSummary) {
    log::info!(
        "Linked document {}: {} mentions, {} new links, {} new attendees, {} new people",
        scope.document_id,
        summary.mentions,
        summary.links_created,
        summary.attendees_created,
        summary.people_created
    );
}

/// Find the canonical attendee for a mention, creating identities if needed.
/// `None` when the name normalizes to nothing.
fn resolve_attendee(
    db: &RecordsDb,
    body: &DbGoverningBody,
    town_id: i64,
    mention: &AttendeeMention,
    seen_at: &str,
    summary: &mut LinkSummary,
) -> Result<Option<DbAttendee>, DbError> {
    let normalized = normalize_name(&mention.name, true);
    if normalized.is_empty() {
        return Ok(None);
    }

    if let Some(active) = db.find_active_attendee(&normalized, &body.name)? {
        return Ok(Some(active));
    }
    if let Some(merged) = db.find_merged_attendee(&normalized, &body.name)? {
        if let Some(canonical) = db.canonical_attendee(merged.id)? {
            return Ok(Some(canonical));
        }
    }

    let (person, person_created) = match db.find_person_by_normalized_name(town_id, &normalized)? {
        Some(p) => (p, false),
        None => (db.insert_person(town_id, &mention.name)?, true),
    };
    let (attendee, created) =
        db.insert_attendee_or_fetch_existing(person.id, &mention.name, &body.name, Some(seen_at))?;

    if created {
        summary.attendees_created += 1;
        if person_created {
            summary.people_created += 1;
        }
    } else if person_created {
        // Lost the race: the winner's attendee already owns a person.
        db.delete_unreferenced_person(person.id)?;
    }
    Ok(Some(attendee))
}
