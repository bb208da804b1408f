//! Pull request description scanner.
//!
//! A description is split into trimmed, whitespace-collapsed lines and
//! scanned once, front to back. Two headers are recognized, case
//! insensitively and behind any leading markdown noise (`#`, `>`, `*`, `_`):
//!
//! - `Changelog category`: the category is the value on the header line, or
//!   else the next line (one blank line may sit in between), with leading
//!   list markers removed.
//! - `Changelog entry` / `Short description`: the entry is the value on the
//!   header line plus, or else, the following non-blank lines (again after
//!   at most one blank line) joined with single spaces.
//!
//! Only the first occurrence of each header counts. Everything else is
//! ignored.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref CATEGORY_HEADER: Regex =
        Regex::new(r"(?i)^[#>*_ ]*change\s*log\s*category").unwrap();
    static ref ENTRY_HEADER: Regex =
        Regex::new(r"(?i)^[#>*_ ]*(?:short\s*description|change\s*log\s*entry)").unwrap();
    /// Decoration between the header words and an inline value, e.g.
    /// `** (leave one):`.
    static ref HEADER_TAIL: Regex = Regex::new(r"^[*_ ]*(?:\([^)]*\))?[*_ ]*:?[*_ ]*").unwrap();
    static ref LIST_MARKER: Regex = Regex::new(r"^[-*\s]*").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// What the scanner found in a description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    /// Raw category text, `None` when missing or empty.
    pub category: Option<String>,
    /// Entry text, empty when missing.
    pub entry: String,
}

/// Splits a body into normalized lines. Blank lines are kept; they
/// delimit the parts of a description.
fn normalize_lines(body: &str) -> Vec<String> {
    body.split('\n')
        .map(|line| WHITESPACE.replace_all(line.trim(), " ").into_owned())
        .collect()
}

fn is_header(line: &str) -> bool {
    CATEGORY_HEADER.is_match(line) || ENTRY_HEADER.is_match(line)
}

/// Value written on the header line itself, after the header words.
fn inline_value(rest: &str) -> &str {
    let tail = HEADER_TAIL.find(rest).map_or(0, |m| m.end());
    rest[tail..].trim()
}

/// Index of the first value line after a header at `i - 1`, skipping one
/// blank line.
fn skip_one_blank(lines: &[String], mut i: usize) -> usize {
    if i < lines.len() && lines[i].is_empty() {
        i += 1;
    }
    i
}

/// Scans a pull request description.
///
/// ## Examples
///
/// ```
/// use changelog_lib::parser::parse_description;
///
/// let parsed = parse_description(
///     "### Changelog category (leave one):\n- Bug Fix\n\n\
///      ### Changelog entry:\nFixed a crash\nin the parser\n",
/// );
/// assert_eq!(parsed.category.as_deref(), Some("Bug Fix"));
/// assert_eq!(parsed.entry, "Fixed a crash in the parser");
/// ```
pub fn parse_description(body: &str) -> ParsedDescription {
    let lines = normalize_lines(body);
    let mut parsed = ParsedDescription::default();
    let mut category_seen = false;
    let mut entry_seen = false;
    let mut i = 0;

    while i < lines.len() {
        let line = &lines[i];
        i += 1;

        if let Some(header) = CATEGORY_HEADER.find(line) {
            if category_seen {
                continue;
            }
            category_seen = true;

            let inline = inline_value(&line[header.end()..]);
            let value = if !inline.is_empty() {
                inline.to_string()
            } else {
                i = skip_one_blank(&lines, i);
                match lines.get(i) {
                    Some(next) if !is_header(next) => {
                        i += 1;
                        next.clone()
                    }
                    _ => String::new(),
                }
            };

            let value = LIST_MARKER.replace(&value, "").trim().to_string();
            if !value.is_empty() {
                parsed.category = Some(value);
            }
        } else if let Some(header) = ENTRY_HEADER.find(line) {
            if entry_seen {
                continue;
            }
            entry_seen = true;

            let mut entry_lines: Vec<&str> = Vec::new();
            let inline = inline_value(&line[header.end()..]);
            if !inline.is_empty() {
                entry_lines.push(inline);
            } else {
                i = skip_one_blank(&lines, i);
            }
            while i < lines.len() && !lines[i].is_empty() && !is_header(&lines[i]) {
                entry_lines.push(&lines[i]);
                i += 1;
            }
            parsed.entry = entry_lines.join(" ");
        }
    }

    parsed
}
