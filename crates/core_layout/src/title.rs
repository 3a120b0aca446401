//! Title normalization and title similarity scoring.
//!
//! Raw window titles drift constantly (unread counters, unsaved markers,
//! application names appended by the browser or editor). Identity matching
//! works on the normalized form produced by [`clean_title`].

use regex::Regex;
use std::sync::OnceLock;

/// Known application-chrome suffixes, stripped from the end of a title.
///
/// The table is matched in order and the first hit wins, so entries that
/// overlap a shorter entry must come before it.
pub const DEFAULT_TITLE_SUFFIXES: &[&str] = &[
    " - Google Chrome",
    " - Mozilla Firefox Private Browsing",
    " \u{2014} Mozilla Firefox Private Browsing",
    " - Mozilla Firefox",
    " \u{2014} Mozilla Firefox",
    " - Microsoft\u{200b} Edge",
    " - Microsoft Edge",
    " - Brave",
    " - Opera",
    " - Vivaldi",
    " - Visual Studio Code - Insiders",
    " - Visual Studio Code",
    " - Microsoft Visual Studio",
    " - Cursor",
    " - Notepad++",
    " - Notepad",
    " - Sublime Text (UNREGISTERED)",
    " - Sublime Text",
    " - Obsidian",
    " - Discord",
    " - Slack",
    " | Microsoft Teams",
    " - Microsoft Teams",
    " - Word",
    " - Excel",
    " - PowerPoint",
    " - Outlook",
    " - File Explorer",
    " - Paint",
];

/// Characters left dangling once a suffix is removed.
const TRAILING_SEPARATORS: &[char] = &['-', '\u{2013}', '\u{2014}', '|', '\u{00b7}', ':', '\u{2022}'];

/// Minimum token length (in chars) counted by [`title_similarity`].
const MIN_WORD_LEN: usize = 2;

/// Leading notification counters such as `(3) ` and bullet/unsaved markers.
fn prefix_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:(?:\(\d+\+?\)|[\u{2022}\u{25cf}\u{25cb}\u{25c6}\u{25b6}\u{25ba}\u{00b7}*])\s*)+").ok())
        .as_ref()
}

/// The default suffix table as owned strings, for settings.
pub fn default_title_suffixes() -> Vec<String> {
    DEFAULT_TITLE_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

/// Normalize a raw window title.
///
/// Strips leading counters and bullet markers, then the first matching suffix
/// from `suffixes`, then any trailing separators.
pub fn clean_title(raw: &str, suffixes: &[String]) -> String {
    let mut title = raw.trim();

    if let Some(re) = prefix_pattern() {
        if let Some(m) = re.find(title) {
            title = &title[m.end()..];
        }
    }

    for suffix in suffixes {
        if suffix.is_empty() {
            continue;
        }
        if let Some(stripped) = title.strip_suffix(suffix.as_str()) {
            title = stripped;
            break;
        }
    }

    title
        .trim_end_matches(|c: char| c.is_whitespace() || TRAILING_SEPARATORS.contains(&c))
        .trim_start()
        .to_string()
}

fn words(title: &str) -> Vec<&str> {
    title
        .split_whitespace()
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .collect()
}

/// Score how alike two normalized titles are, from 0 to 100.
///
/// - equal (case-insensitive): 100
/// - one empty, the other not: 0
/// - one contains the other: 80
/// - otherwise: shared words of two or more chars over the larger word
///   count, scaled to 60
///
/// This is a heuristic that prefers a missed match over a wrong one.
pub fn title_similarity(a: &str, b: &str) -> u8 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 80;
    }

    let words_a = words(&a);
    let words_b = words(&b);
    let max = words_a.len().max(words_b.len());
    if max == 0 {
        return 0;
    }

    let mut used = vec![false; words_b.len()];
    let mut common = 0usize;
    for word in &words_a {
        if let Some(slot) = words_b
            .iter()
            .enumerate()
            .position(|(i, other)| !used[i] && other == word)
        {
            used[slot] = true;
            common += 1;
        }
    }

    ((common as f64 / max as f64) * 60.0).round() as u8
}
