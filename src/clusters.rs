//! Grouping pairwise duplicate suggestions into connected clusters.
//!
//! A union-find over a dense arena is built fresh for every request from the
//! current suggestion rows; nothing is cached between calls.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::{DbError, DbPerson, MatchType, RecordsDb};

/// Disjoint-set forest over arena slots `0..len`.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    /// Root of `i`, compressing the path on the way back.
    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// One connected component of suggestion edges, by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCluster {
    /// Sorted ascending.
    pub member_ids: Vec<i64>,
    pub exact_matches: usize,
    pub similar_matches: usize,
}

/// A cluster with its Person rows, as shown to a reviewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub people: Vec<DbPerson>,
    pub exact_matches: usize,
    pub similar_matches: usize,
}

/// Group `(a, b, match_type)` edges into connected components, largest first.
///
/// Match counts only include member pairs joined by a direct edge. Clusters
/// of equal size are ordered by their smallest member id.
pub fn cluster_edges(edges: &[(i64, i64, MatchType)]) -> Vec<IdCluster> {
    let mut slot_of: HashMap<i64, usize> = HashMap::new();
    let mut ids: Vec<i64> = Vec::new();
    let mut slot = |id: i64, ids: &mut Vec<i64>| {
        *slot_of.entry(id).or_insert_with(|| {
            ids.push(id);
            ids.len() - 1
        })
    };

    let mut direct: HashMap<(i64, i64), MatchType> = HashMap::new();
    let mut slotted_edges = Vec::with_capacity(edges.len());
    for &(a, b, match_type) in edges {
        if a == b {
            continue;
        }
        let (sa, sb) = (slot(a, &mut ids), slot(b, &mut ids));
        slotted_edges.push((sa, sb));
        direct.insert((a.min(b), a.max(b)), match_type);
    }

    let mut forest = UnionFind::new(ids.len());
    for (sa, sb) in slotted_edges {
        forest.union(sa, sb);
    }

    let mut by_root: HashMap<usize, Vec<i64>> = HashMap::new();
    for (i, id) in ids.iter().enumerate() {
        by_root.entry(forest.find(i)).or_default().push(*id);
    }

    let mut clusters: Vec<IdCluster> = by_root
        .into_values()
        .map(|mut members| {
            members.sort_unstable();
            let (mut exact, mut similar) = (0, 0);
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    match direct.get(&(*a, *b)) {
                        Some(MatchType::Exact) => exact += 1,
                        Some(MatchType::Similar) => similar += 1,
                        None => {}
                    }
                }
            }
            IdCluster {
                member_ids: members,
                exact_matches: exact,
                similar_matches: similar,
            }
        })
        .collect();

    clusters.sort_by(|a, b| {
        b.member_ids
            .len()
            .cmp(&a.member_ids.len())
            .then_with(|| a.member_ids.first().cmp(&b.member_ids.first()))
    });
    clusters
}

/// Current duplicate clusters of Person rows.
///
/// With `town_id`, keeps only clusters that have at least one member in that
/// town. Suggestions pointing at people that no longer exist are skipped.
pub fn list_duplicate_groups(
    db: &RecordsDb,
    town_id: Option<i64>,
) -> Result<Vec<DuplicateGroup>, DbError> {
    let edges: Vec<(i64, i64, MatchType)> = db
        .get_duplicate_suggestions()?
        .into_iter()
        .map(|s| (s.person_id, s.duplicate_person_id, s.match_type))
        .collect();
    let clusters = cluster_edges(&edges);

    let all_ids: Vec<i64> = clusters
        .iter()
        .flat_map(|c| c.member_ids.iter().copied())
        .collect();
    let people: HashMap<i64, DbPerson> = db
        .get_people_by_ids(&all_ids)?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut groups = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        let members: Vec<DbPerson> = cluster
            .member_ids
            .iter()
            .filter_map(|id| people.get(id).cloned())
            .collect();
        if members.len() < 2 {
            continue;
        }
        if let Some(town) = town_id {
            if !members.iter().any(|p| p.town_id == town) {
                continue;
            }
        }
        groups.push(DuplicateGroup {
            people: members,
            exact_matches: cluster.exact_matches,
            similar_matches: cluster.similar_matches,
        });
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::*;
    use crate::duplicates::detect_duplicates;

    #[test]
    fn test_chain_and_pair_form_two_groups() {
        let edges = vec![
            (1, 2, MatchType::Exact),
            (2, 3, MatchType::Similar),
            (4, 5, MatchType::Similar),
        ];
        let clusters = cluster_edges(&edges);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].member_ids, vec![1, 2, 3]);
        assert_eq!(clusters[1].member_ids, vec![4, 5]);

        // (1,3) has no direct edge, so it is not counted
        assert_eq!((clusters[0].exact_matches, clusters[0].similar_matches), (1, 1));
        assert_eq!((clusters[1].exact_matches, clusters[1].similar_matches), (0, 1));
    }

    #[test]
    fn test_no_edges_no_groups() {
        assert!(cluster_edges(&[]).is_empty());
    }

    #[test]
    fn test_long_chain_collapses_to_one_root() {
        let edges: Vec<(i64, i64, MatchType)> =
            (1..200).map(|i| (i, i + 1, MatchType::Similar)).collect();
        let clusters = cluster_edges(&edges);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].member_ids.len(), 200);
        assert_eq!(clusters[0].similar_matches, 199);
    }

    #[test]
    fn test_find_compresses_paths() {
        let mut forest = UnionFind::new(4);
        forest.union(0, 1);
        forest.union(1, 2);
        forest.union(2, 3);
        assert_eq!(forest.find(0), 3);
        assert_eq!(forest.parent[0], 3);
        assert_eq!(forest.parent[1], 3);
    }

    #[test]
    fn test_list_duplicate_groups_with_town_filter() {
        let db = test_db();
        let (ashby, _) = seed_town_with_body(&db, "Ashby", "Select Board");
        let (groton, _) = seed_town_with_body(&db, "Groton", "Select Board");
        let a = seed_person(&db, ashby, "John Smith");
        let b = seed_person(&db, ashby, "Jon Smith");
        let c = seed_person(&db, groton, "Mary Jones");
        let d = seed_person(&db, groton, "Mary Jones");
        detect_duplicates(&db, 20).unwrap();

        let all = list_duplicate_groups(&db, None).unwrap();
        assert_eq!(all.len(), 2);

        let groton_only = list_duplicate_groups(&db, Some(groton)).unwrap();
        assert_eq!(groton_only.len(), 1);
        let ids: Vec<i64> = groton_only[0].people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![c, d]);
        assert_eq!(groton_only[0].exact_matches, 1);

        let ashby_only = list_duplicate_groups(&db, Some(ashby)).unwrap();
        let ids: Vec<i64> = ashby_only[0].people.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b]);
    }
}
