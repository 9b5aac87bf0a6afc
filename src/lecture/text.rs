//! Narration text handling
//!
//! Cleans raw slide text before it is narrated and splits transcripts into
//! sentence-like segments for cue timing.

use std::sync::LazyLock;

use regex::Regex;

const TERMINALS: [char; 3] = ['.', '!', '?'];
const CLOSERS: [char; 7] = ['"', '\'', ')', ']', '}', '\u{201d}', '\u{2019}'];

static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());
static PERIOD_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.([A-Z])").unwrap());
static COMMA_LETTER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",([A-Za-z])").unwrap());
static DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[\u{2014}\u{2013}]\s*| - ").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PERIODS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static COMMAS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",{2,}").unwrap());

/// Abbreviations spelled out so the narrator does not read them as sentence ends
const ABBREVIATIONS: [(&str, &str); 10] = [
    ("Dr.", "Doctor"),
    ("Mr.", "Mister"),
    ("Mrs.", "Misses"),
    ("Prof.", "Professor"),
    ("vs.", "versus"),
    ("etc.", "etcetera"),
    ("e.g.", "for example"),
    ("i.e.", "that is"),
    ("approx.", "approximately"),
    ("avg.", "average"),
];

/// Prepare raw slide text for narration
///
/// Joins line breaks that fall mid-sentence, normalizes spacing and dashes,
/// expands common abbreviations and guarantees terminal punctuation.
pub fn clean_for_narration(text: &str) -> String {
    let text = SPACES.replace_all(text, " ");

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match lines.last_mut() {
            Some(prev) if !prev.ends_with(['.', '!', '?', ':']) => {
                prev.push(' ');
                prev.push_str(line);
            }
            _ => lines.push(line.to_string()),
        }
    }
    let text = lines.join(" ");

    let text = PERIOD_LETTER.replace_all(&text, ". $1");
    let text = COMMA_LETTER.replace_all(&text, ", $1");
    let mut text = DASH.replace_all(&text, ", ").into_owned();
    for (abbr, full) in ABBREVIATIONS {
        text = text.replace(abbr, full);
    }

    let text = WHITESPACE.replace_all(&text, " ");
    let text = PERIODS.replace_all(&text, ".");
    let text = COMMAS.replace_all(&text, ",");
    let mut text = text.trim().to_string();

    if !text.is_empty() && !text.ends_with(TERMINALS) {
        text.push('.');
    }
    text
}

/// Number of words in `text`
///
/// A word is a whitespace-separated token with at least one alphanumeric
/// character, so stray punctuation counts as zero words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Split a transcript at sentence punctuation
///
/// A boundary is a run of `.`, `!` or `?` (plus any closing quotes or
/// brackets) followed by whitespace or the end of the text. Decimal numbers
/// like `3.14` stay intact. Whitespace inside each fragment is collapsed.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        i += 1;

        if TERMINALS.contains(&c) {
            while i < chars.len() && (TERMINALS.contains(&chars[i]) || CLOSERS.contains(&chars[i]))
            {
                current.push(chars[i]);
                i += 1;
            }
            if i == chars.len() || chars[i].is_whitespace() {
                push_fragment(&mut fragments, &mut current);
            }
        }
    }
    push_fragment(&mut fragments, &mut current);
    fragments
}

fn push_fragment(fragments: &mut Vec<String>, current: &mut String) {
    let fragment = current.split_whitespace().collect::<Vec<_>>().join(" ");
    if !fragment.is_empty() {
        fragments.push(fragment);
    }
    current.clear();
}

/// Merge fragments shorter than `min_words` into the fragment that follows
///
/// A short fragment at the very end is appended to the previous one instead.
pub fn merge_short_fragments(fragments: Vec<String>, min_words: usize) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(fragments.len());
    let mut carry = String::new();

    for fragment in fragments {
        let joined = if carry.is_empty() {
            fragment
        } else {
            format!("{} {}", carry, fragment)
        };
        if word_count(&joined) < min_words {
            carry = joined;
        } else {
            merged.push(joined);
            carry.clear();
        }
    }

    if !carry.is_empty() {
        match merged.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&carry);
            }
            None => merged.push(carry),
        }
    }
    merged
}
