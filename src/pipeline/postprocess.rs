//! Post-processing: deterministic cleanup of rendered wikitext.
//!
//! The renderer concatenates blocks that each carry their own leading
//! separator, and Word text carries characters that are invisible in the
//! editor but visible (or harmful) in wikitext. These rules fix both without
//! touching content.
//!
//! ## Rule Order
//!
//! Line endings are normalised before trimming so `\r` is not treated as
//! trailing content; blank lines are collapsed last because trimming can
//! turn whitespace-only lines into empty ones.
//!
//! The leading `\n\n` of the first block is kept and no final newline is
//! added: the page text is exactly the rendered document.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to rendered wikitext.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive newlines down to 2
pub fn clean_wikitext(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    collapse_blank_lines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
