//! Levenshtein edit distance between two already-normalized names.

/// Unit-cost insert/delete/substitute distance over Unicode scalar values.
/// Callers normalize first; no folding happens here.
pub fn edit_distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_vectors() {
        assert_eq!(edit_distance("john", "john"), 0);
        assert_eq!(edit_distance("john", "jon"), 1);
        assert_eq!(edit_distance("john", "jane"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_symmetric() {
        let words = ["", "a", "john", "jane", "jon smith", "john smyth", "élodie"];
        for a in words {
            for b in words {
                assert_eq!(edit_distance(a, b), edit_distance(b, a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(edit_distance("élodie", "elodie"), 1);
    }
}
