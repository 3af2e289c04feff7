//! # Title List Parsing
//!
//! Converts a language-model reply into an ordered list of candidate movie
//! titles. The model is asked for a numbered list; parsing is line-based and
//! tolerant of missing numbers and quoting.

use crate::primitives::MAX_EXTRACTED_TITLES;

/// Fixed instruction sent with every extraction request.
pub const EXTRACTION_INSTRUCTION: &str = "You extract movie titles from user requests. \
Reply with a numbered list of real, existing movie titles only, one per line, \
formatted as `1. Title`. Do not add years, commentary, or any other text. \
If the request names or implies no movies, reply with nothing.";

/// Characters stripped from both ends of a candidate.
const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove `<think>…</think>` sections emitted by reasoning models.
///
/// An unterminated block swallows the rest of the reply.
#[must_use]
pub fn strip_reasoning(reply: &str) -> String {
    let mut out = String::with_capacity(reply.len());
    let mut rest = reply;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(end) => rest = &after_open[end + THINK_CLOSE.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Parse one reply line into a candidate title.
fn parse_line(line: &str) -> Option<String> {
    let candidate = match line.split_once('.') {
        Some((_, after)) => after,
        None => line,
    };
    let cleaned = candidate.trim().trim_matches(QUOTES).trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Parse a model reply into candidate titles, in reply order.
///
/// ```
/// use neuraflix_core::titles::parse_titles;
/// assert_eq!(parse_titles("1. Toy Story\n2. \"Cars\"\n"), vec!["Toy Story", "Cars"]);
/// ```
#[must_use]
pub fn parse_titles(reply: &str) -> Vec<String> {
    strip_reasoning(reply)
        .lines()
        .filter_map(parse_line)
        .take(MAX_EXTRACTED_TITLES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_and_quoted() {
        assert_eq!(
            parse_titles("1. Toy Story\n2. \"Cars\"\n"),
            vec!["Toy Story", "Cars"]
        );
    }

    #[test]
    fn unnumbered_lines_are_kept() {
        assert_eq!(parse_titles("Up\n  'Coco'  \n"), vec!["Up", "Coco"]);
    }

    #[test]
    fn only_first_dot_splits() {
        assert_eq!(parse_titles("3. Dr. Strangelove"), vec!["Dr. Strangelove"]);
    }

    #[test]
    fn repeated_titles_are_kept_in_order() {
        assert_eq!(
            parse_titles("1. Cars\n2. Up\n3. Cars"),
            vec!["Cars", "Up", "Cars"]
        );
    }

    #[test]
    fn empty_reply_is_empty_list() {
        assert!(parse_titles("").is_empty());
        assert!(parse_titles("\n\n1. \n").is_empty());
    }

    #[test]
    fn typographic_quotes_are_stripped() {
        assert_eq!(parse_titles("1. \u{201C}Ratatouille\u{201D}"), vec!["Ratatouille"]);
    }

    #[test]
    fn reasoning_blocks_are_ignored() {
        let reply = "<think>the user wants Pixar. 1. maybe Cars?</think>\n1. Toy Story";
        assert_eq!(parse_titles(reply), vec!["Toy Story"]);
    }

    #[test]
    fn unterminated_reasoning_drops_tail() {
        assert_eq!(strip_reasoning("a<think>b"), "a");
    }

    #[test]
    fn output_is_capped() {
        let reply: String = (1..=MAX_EXTRACTED_TITLES + 10)
            .map(|i| format!("{i}. Movie {i}\n"))
            .collect();
        assert_eq!(parse_titles(&reply).len(), MAX_EXTRACTED_TITLES);
    }
}
