//! Turning user input into FTS5 match expressions, and FTS5 snippets into
//! safe HTML.

use crate::db::{HIGHLIGHT_CLOSE, HIGHLIGHT_OPEN};

/// Words FTS5 treats as operators when they appear bare.
const OPERATOR_WORDS: &[&str] = &["AND", "OR", "NOT", "NEAR"];

/// Split raw input into plain search terms.
///
/// Every character that is not alphanumeric becomes a separator, which
/// removes quotes, parentheses, `*`, `^`, `:` and the like. Bare operator
/// words are dropped regardless of case.
pub fn sanitize_terms(raw: &str) -> Vec<String> {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .filter(|term| {
            !OPERATOR_WORDS
                .iter()
                .any(|op| op.eq_ignore_ascii_case(term))
        })
        .map(str::to_string)
        .collect()
}

/// Build the match expression: every term as a quoted phrase, the last one
/// also prefix-matched. `None` when no terms survive sanitization.
pub fn build_match_expression(raw: &str) -> Option<String> {
    let terms = sanitize_terms(raw);
    let (last, earlier) = terms.split_last()?;
    let mut parts: Vec<String> = earlier.iter().map(|t| format!("\"{t}\"")).collect();
    parts.push(format!("\"{last}\"*"));
    Some(parts.join(" "))
}

/// Escape a raw FTS5 snippet so only the highlight markers become markup.
pub fn render_snippet(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    for c in raw.chars() {
        match c {
            HIGHLIGHT_OPEN => out.push_str("<mark>"),
            HIGHLIGHT_CLOSE => out.push_str("</mark>"),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_syntax() {
        assert_eq!(
            sanitize_terms(r#"budget AND "school (roof)" OR NOT near* ^x:y"#),
            vec!["budget", "school", "roof", "x", "y"]
        );
        assert_eq!(sanitize_terms("Nearby Andover"), vec!["Nearby", "Andover"]);
    }

    #[test]
    fn test_blank_and_operator_only_queries() {
        assert!(build_match_expression("").is_none());
        assert!(build_match_expression("   ").is_none());
        assert!(build_match_expression("\"()*").is_none());
        assert!(build_match_expression("and OR not").is_none());
    }

    #[test]
    fn test_last_term_is_prefix() {
        assert_eq!(build_match_expression("budget").as_deref(), Some("\"budget\"*"));
        assert_eq!(
            build_match_expression("school bud").as_deref(),
            Some("\"school\" \"bud\"*")
        );
    }

    #[test]
    fn test_render_snippet_escapes_everything_but_markers() {
        let raw = format!("<script>alert('x')</script> {HIGHLIGHT_OPEN}budget{HIGHLIGHT_CLOSE} & more");
        assert_eq!(
            render_snippet(&raw),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; <mark>budget</mark> &amp; more"
        );
    }
}
