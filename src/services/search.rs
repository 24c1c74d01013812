// Search service: ranked full-text queries over the FTS projection, and the
// projections themselves (one entry per person, governing body and
// document, plus one per topic of a complete document).

use serde::Serialize;

use crate::db::{DbDocument, DbError, DbGoverningBody, DbPerson, DbSearchEntry, RecordsDb};
use crate::entity::SearchEntityType;
use crate::processor::metadata;
use crate::queries::search::{build_match_expression, render_snippet};
use crate::types::Config;

/// One ranked hit, with an HTML-safe snippet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub entity_type: SearchEntityType,
    pub entity_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub url: String,
    /// Escaped excerpt; `<mark>` is the only markup it contains.
    pub snippet: String,
    /// bm25 score; lower is more relevant.
    pub rank: f64,
}

/// Match totals per entity type, for filter-tab badges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCounts {
    pub document: i64,
    pub topic: i64,
    pub person: i64,
    pub governing_body: i64,
}

impl SearchCounts {
    pub fn total(&self) -> i64 {
        self.document + self.topic + self.person + self.governing_body
    }

    fn add(&mut self, entity_type: SearchEntityType, count: i64) {
        match entity_type {
            SearchEntityType::Document => self.document += count,
            SearchEntityType::Topic => self.topic += count,
            SearchEntityType::Person => self.person += count,
            SearchEntityType::GoverningBody => self.governing_body += count,
        }
    }
}

/// Entries written by a full rebuild, per kind.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildSummary {
    pub people: usize,
    pub governing_bodies: usize,
    pub documents: usize,
    pub topics: usize,
}

// =============================================================================
// Read path
// =============================================================================

/// Ranked search over the index.
///
/// Never fails: blank or fully-sanitized-away queries, a type filter with no
/// valid types, and storage errors all yield an empty list (errors are
/// logged).
pub fn search(
    db: &RecordsDb,
    query: &str,
    types: Option<&[&str]>,
    limit: usize,
) -> Vec<SearchResult> {
    let Some(expression) = build_match_expression(query) else {
        return Vec::new();
    };

    let filter: Vec<&str> = match types {
        None => Vec::new(),
        Some(requested) => {
            let mut valid: Vec<SearchEntityType> = requested
                .iter()
                .filter_map(|t| SearchEntityType::parse(t))
                .collect();
            valid.sort_by_key(|t| t.as_str());
            valid.dedup();
            if valid.is_empty() {
                return Vec::new();
            }
            valid.iter().map(|t| t.as_str()).collect()
        }
    };

    match db.search_index_matches(&expression, &filter, limit) {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|row| {
                let entity_type = SearchEntityType::parse(&row.entity_type)?;
                Some(SearchResult {
                    entity_type,
                    entity_id: row.entity_id,
                    title: row.title,
                    subtitle: row.subtitle,
                    url: row.url,
                    snippet: render_snippet(&row.raw_snippet),
                    rank: row.rank,
                })
            })
            .collect(),
        Err(e) => {
            log::warn!("Search for {:?} failed: {}", query, e);
            Vec::new()
        }
    }
}

/// Per-type match totals for `query`, independent of any result limit.
pub fn search_counts(db: &RecordsDb, query: &str) -> SearchCounts {
    let mut counts = SearchCounts::default();
    let Some(expression) = build_match_expression(query) else {
        return counts;
    };
    match db.search_index_counts(&expression) {
        Ok(rows) => {
            for row in rows {
                if let Some(entity_type) = SearchEntityType::parse(&row.entity_type) {
                    counts.add(entity_type, row.count);
                }
            }
        }
        Err(e) => log::warn!("Search counts for {:?} failed: {}", query, e),
    }
    counts
}

/// Type-ahead search (JSON dropdown).
pub fn quick_search(
    db: &RecordsDb,
    config: &Config,
    query: &str,
    types: Option<&[&str]>,
) -> Vec<SearchResult> {
    search(db, query, types, config.quick_search_limit)
}

/// Results page search.
pub fn full_search(
    db: &RecordsDb,
    config: &Config,
    query: &str,
    types: Option<&[&str]>,
) -> Vec<SearchResult> {
    search(db, query, types, config.full_search_limit)
}

// =============================================================================
// Write path
// =============================================================================

/// Clear and repopulate the whole index from source rows in one transaction.
pub fn rebuild_search_index(db: &RecordsDb) -> Result<RebuildSummary, DbError> {
    let summary = db.with_transaction(|tx| {
        tx.clear_search_index()?;
        let mut summary = RebuildSummary::default();

        for person in tx.get_people()? {
            tx.insert_search_entry(&person_entry(tx, &person)?)?;
            summary.people += 1;
        }
        for body in tx.get_governing_bodies()? {
            tx.insert_search_entry(&governing_body_entry(tx, &body)?)?;
            summary.governing_bodies += 1;
        }
        for doc in tx.get_documents()? {
            for entry in document_entries(tx, &doc)? {
                if entry.entity_type == SearchEntityType::Topic.as_str() {
                    summary.topics += 1;
                } else {
                    summary.documents += 1;
                }
                tx.insert_search_entry(&entry)?;
            }
        }
        Ok(summary)
    })?;

    log::info!(
        "Search index rebuilt: {} people, {} governing bodies, {} documents, {} topics",
        summary.people,
        summary.governing_bodies,
        summary.documents,
        summary.topics
    );
    Ok(summary)
}

/// Replace the entries for one entity with a fresh projection. An entity
/// that no longer exists just has its entries cleared. A topic reindexes
/// its whole document.
pub fn reindex_entity(
    db: &RecordsDb,
    entity_type: SearchEntityType,
    id: i64,
) -> Result<(), DbError> {
    db.with_transaction(|tx| match entity_type {
        SearchEntityType::Person => {
            tx.clear_search_entity(SearchEntityType::Person.as_str(), id)?;
            if let Some(person) = tx.get_person(id)? {
                tx.insert_search_entry(&person_entry(tx, &person)?)?;
            }
            Ok(())
        }
        SearchEntityType::GoverningBody => {
            tx.clear_search_entity(SearchEntityType::GoverningBody.as_str(), id)?;
            if let Some(body) = tx.get_governing_body(id)? {
                tx.insert_search_entry(&governing_body_entry(tx, &body)?)?;
            }
            Ok(())
        }
        SearchEntityType::Document | SearchEntityType::Topic => {
            clear_document_entries(tx, id)?;
            if let Some(doc) = tx.get_document(id)? {
                for entry in document_entries(tx, &doc)? {
                    tx.insert_search_entry(&entry)?;
                }
            }
            Ok(())
        }
    })?;
    log::debug!("Reindexed {} {}", entity_type.as_str(), id);
    Ok(())
}

/// Reindex after a committed mutation. The index is a derived cache, so a
/// failure is logged and left for the next rebuild.
pub(crate) fn reindex_after_commit(db: &RecordsDb, entity_type: SearchEntityType, id: i64) {
    if let Err(e) = reindex_entity(db, entity_type, id) {
        log::warn!("Reindex of {} {} failed: {}", entity_type.as_str(), id, e);
    }
}

/// Drop the document entry and all of its topic entries.
pub(crate) fn clear_document_entries(db: &RecordsDb, document_id: i64) -> Result<(), DbError> {
    db.clear_search_entity(SearchEntityType::Document.as_str(), document_id)?;
    db.clear_search_entity(SearchEntityType::Topic.as_str(), document_id)?;
    Ok(())
}

// =============================================================================
// Projections
// =============================================================================

/// Append `item` unless an equal string (ignoring case) is already present.
fn push_distinct(parts: &mut Vec<String>, item: &str) {
    let item = item.trim();
    if !item.is_empty() && !parts.iter().any(|p| p.eq_ignore_ascii_case(item)) {
        parts.push(item.to_string());
    }
}

fn person_entry(db: &RecordsDb, person: &DbPerson) -> Result<DbSearchEntry, DbError> {
    let town = db.get_town(person.town_id)?;
    let mut parts = vec![person.name.clone()];
    for attendee in db.get_attendees_for_person(person.id)? {
        push_distinct(&mut parts, &attendee.name);
        for body in &attendee.governing_bodies {
            push_distinct(&mut parts, body);
        }
    }
    Ok(DbSearchEntry {
        entity_type: SearchEntityType::Person.as_str().to_string(),
        entity_id: person.id,
        title: person.name.clone(),
        subtitle: town.map(|t| t.name),
        content: parts.join(" "),
        url: format!("/people/{}", person.id),
    })
}

fn governing_body_entry(db: &RecordsDb, body: &DbGoverningBody) -> Result<DbSearchEntry, DbError> {
    let town = match body.town_id {
        Some(id) => db.get_town(id)?,
        None => None,
    };
    let mut parts = vec![body.name.clone()];
    if let Some(t) = &town {
        parts.push(t.name.clone());
    }
    Ok(DbSearchEntry {
        entity_type: SearchEntityType::GoverningBody.as_str().to_string(),
        entity_id: body.id,
        title: body.name.clone(),
        subtitle: town.map(|t| t.name),
        content: parts.join(" "),
        url: format!("/governing-bodies/{}", body.id),
    })
}

/// Document entry plus one entry per topic. Empty when the document's
/// governing body has no town; topics only once extraction is complete.
fn document_entries(db: &RecordsDb, doc: &DbDocument) -> Result<Vec<DbSearchEntry>, DbError> {
    let body = match doc.governing_body_id {
        Some(id) => db.get_governing_body(id)?,
        None => None,
    };
    let Some(body) = body.filter(|b| b.town_id.is_some()) else {
        return Ok(Vec::new());
    };

    let meeting_date = metadata::meeting_date(doc);
    let topics = metadata::topics(doc);

    let subtitle = match &meeting_date {
        Some(date) => format!("{} | {}", body.name, date),
        None => body.name.clone(),
    };

    let mut content: Vec<String> = Vec::new();
    if let Some(kind) = metadata::document_type(doc) {
        content.push(kind);
    }
    for mention in metadata::attendee_mentions(doc) {
        content.push(mention.name);
    }
    for topic in &topics {
        content.push(topic.title.clone());
        if let Some(summary) = &topic.summary {
            content.push(summary.clone());
        }
    }
    if let Some(text) = doc.extracted_text.as_deref().filter(|t| !t.trim().is_empty()) {
        content.push(text.to_string());
    }

    let mut entries = vec![DbSearchEntry {
        entity_type: SearchEntityType::Document.as_str().to_string(),
        entity_id: doc.id,
        title: doc.title.clone(),
        subtitle: Some(subtitle),
        content: content.join("\n"),
        url: format!("/documents/{}", doc.id),
    }];

    if doc.is_complete() {
        for (n, topic) in topics.iter().enumerate() {
            let mut topic_content = Vec::new();
            if let Some(summary) = &topic.summary {
                topic_content.push(summary.clone());
            }
            topic_content.extend(topic.action_items.iter().cloned());
            entries.push(DbSearchEntry {
                entity_type: SearchEntityType::Topic.as_str().to_string(),
                entity_id: doc.id,
                title: topic.title.clone(),
                subtitle: Some(doc.title.clone()),
                content: topic_content.join("\n"),
                url: format!("/documents/{}#topic-{}", doc.id, n + 1),
            });
        }
    }
    Ok(entries)
}
