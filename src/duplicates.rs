//! Duplicate identity detection.
//!
//! A full-rebuild pass over every Person (or every active Attendee): each
//! record is compared with every record of greater id, first for an exact
//! normalized-name match and then for a fuzzy match whose tolerance scales
//! with the length of the name.

use serde::Serialize;

use crate::db::{DbError, MatchType, RecordsDb};
use crate::distance::edit_distance;

/// Default tolerance: 20% of the normalized name length.
pub const DEFAULT_SIMILARITY_PERCENT: u32 = 20;

/// A candidate pair of identities believed to be the same human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub first_id: i64,
    pub second_id: i64,
    pub match_type: MatchType,
    /// Edit distance between the two normalized names; 0 when exact.
    pub score: usize,
}

impl DuplicatePair {
    /// (smaller id, larger id).
    pub fn ordered_ids(&self) -> (i64, i64) {
        if self.first_id <= self.second_id {
            (self.first_id, self.second_id)
        } else {
            (self.second_id, self.first_id)
        }
    }
}

/// Summary of one detection run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub records_scanned: usize,
    pub exact_pairs: usize,
    pub similar_pairs: usize,
    pub suggestions_written: usize,
}

/// Largest edit distance tolerated for a name of `name_len` characters:
/// `max(floor(name_len * percent / 100), 1)`.
pub fn max_allowed_distance(name_len: usize, similarity_percent: u32) -> usize {
    (name_len * similarity_percent as usize / 100).max(1)
}

/// Find every exact or similar pair among `(id, normalized_name)` records.
///
/// Records are visited in id order and each is compared only with records of
/// greater id, so every unordered pair appears once with the smaller id
/// first. The tolerance is taken from the lower-id record. Blank names never
/// match anything.
pub fn find_duplicate_pairs(records: &[(i64, String)], similarity_percent: u32) -> Vec<DuplicatePair> {
    let mut sorted: Vec<(i64, &str, usize)> = records
        .iter()
        .filter(|(_, name)| !name.is_empty())
        .map(|(id, name)| (*id, name.as_str(), name.chars().count()))
        .collect();
    sorted.sort_by_key(|(id, _, _)| *id);
    sorted.dedup_by_key(|(id, _, _)| *id);

    let mut pairs = Vec::new();
    for (i, &(id, name, len)) in sorted.iter().enumerate() {
        let max_distance = max_allowed_distance(len, similarity_percent);
        for &(other_id, other_name, other_len) in &sorted[i + 1..] {
            if name == other_name {
                pairs.push(DuplicatePair {
                    first_id: id,
                    second_id: other_id,
                    match_type: MatchType::Exact,
                    score: 0,
                });
                continue;
            }
            // Length gap is a lower bound on the distance.
            if len.abs_diff(other_len) > max_distance {
                continue;
            }
            let distance = edit_distance(name, other_name);
            if distance <= max_distance {
                pairs.push(DuplicatePair {
                    first_id: id,
                    second_id: other_id,
                    match_type: MatchType::Similar,
                    score: distance,
                });
            }
        }
    }
    pairs
}

/// Rebuild the Person duplicate suggestions from scratch.
///
/// Safe to run repeatedly. The delete and bulk insert commit together; the
/// scan itself reads outside that transaction.
pub fn detect_duplicates(db: &RecordsDb, similarity_percent: u32) -> Result<DetectionSummary, DbError> {
    let people = db.get_people()?;
    let records: Vec<(i64, String)> = people
        .into_iter()
        .map(|p| (p.id, p.normalized_name))
        .collect();

    let pairs = find_duplicate_pairs(&records, similarity_percent);
    let written = db.replace_duplicate_suggestions(&pairs)?;

    let summary = summarize(records.len(), &pairs, written);
    log::info!(
        "Duplicate detection: {} people scanned, {} exact, {} similar",
        summary.records_scanned,
        summary.exact_pairs,
        summary.similar_pairs
    );
    Ok(summary)
}

/// Run the same matching over active Attendees. Results are returned, not
/// stored: suggestions only reference Person rows.
pub fn detect_attendee_duplicates(
    db: &RecordsDb,
    similarity_percent: u32,
) -> Result<Vec<DuplicatePair>, DbError> {
    let records: Vec<(i64, String)> = db
        .get_active_attendees()?
        .into_iter()
        .map(|a| (a.id, a.normalized_name))
        .collect();
    let pairs = find_duplicate_pairs(&records, similarity_percent);
    log::debug!(
        "Attendee duplicate scan: {} attendees, {} candidate pairs",
        records.len(),
        pairs.len()
    );
    Ok(pairs)
}

fn summarize(scanned: usize, pairs: &[DuplicatePair], written: usize) -> DetectionSummary {
    let exact = pairs.iter().filter(|p| p.match_type == MatchType::Exact).count();
    DetectionSummary {
        records_scanned: scanned,
        exact_pairs: exact,
        similar_pairs: pairs.len() - exact,
        suggestions_written: written,
    }
}
