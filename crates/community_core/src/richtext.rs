//! Rich-text (HTML) helpers for post bodies.
//!
//! # Invariants
//! - Emptiness is judged on text left after removing every tag, so editor
//!   residue such as `<p><br></p>` counts as empty.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<.*?>").expect("valid tag regex"));
static BLOCK_BREAK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br\s*/?|/p|/div|/h[1-6]|/li|/blockquote)\s*>")
        .expect("valid block regex")
});
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*li(\s[^>]*)?>").expect("valid list item regex"));
static BLANK_LINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("valid blank line regex"));

/// Removes every markup tag, leaving only the text between tags.
pub fn strip_markup(html: &str) -> String {
    TAG_RE.replace_all(html, "").into_owned()
}

/// Returns whether `html` has no visible text once tags are removed.
pub fn is_blank(html: &str) -> bool {
    strip_markup(html).trim().is_empty()
}

/// Renders `html` as plain text for terminal display.
///
/// Block-level closers become line breaks, list items get a bullet, and the
/// common named entities are decoded.
pub fn to_plain_text(html: &str) -> String {
    let with_bullets = LIST_ITEM_RE.replace_all(html, "• ");
    let with_breaks = BLOCK_BREAK_RE.replace_all(&with_bullets, "\n");
    let stripped = strip_markup(&with_breaks);
    let decoded = decode_entities(&stripped);
    BLANK_LINES_RE
        .replace_all(decoded.trim(), "\n")
        .into_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
