//! Response parser: recovers interview questions from free-form model output.
//!
//! Two tiers: a strict parse of the reply as a JSON array of strings, then a
//! line-based scan for enumerated (`1.` / `1)`) or bulleted (`-` / `*`) items.
//! Model output does not reliably follow the requested format, so the fallback
//! keeps a session alive when the model drifts into a numbered list.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Maximum number of questions kept from one generation.
pub const MAX_QUESTIONS: usize = 8;
const SNIPPET_CHARS: usize = 200;

/// Quote characters stripped from the ends of recovered items.
const QUOTES: &[char] = &['"', '\'', '`', '\u{201C}', '\u{201D}', '\u{2018}', '\u{2019}'];

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Could not parse questions from: {snippet}...")]
pub struct ParseError {
    /// Leading slice of the offending text, for diagnostics.
    pub snippet: String,
}

impl ParseError {
    fn from_text(text: &str) -> Self {
        Self {
            snippet: text.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

fn item_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)](?:\s+|$)|[-*\u{2022}]\s+)(.*)$").expect("item marker regex is valid")
    })
}

fn speaker_label() -> &'static Regex {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    LABEL.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:interviewer|question)\s*\d*\s*:\s*")
            .expect("speaker label regex is valid")
    })
}

/// Returns at most [`MAX_QUESTIONS`] question strings in presentation order.
pub fn parse_questions(raw: &str) -> Result<Vec<String>, ParseError> {
    if let Some(mut questions) = parse_structured(raw) {
        questions.truncate(MAX_QUESTIONS);
        return Ok(questions);
    }

    let mut questions = parse_enumerated(raw);
    if questions.is_empty() {
        return Err(ParseError::from_text(raw));
    }
    questions.truncate(MAX_QUESTIONS);
    Ok(questions)
}

/// Extracts a single follow-up question from a plain-text reply.
pub fn parse_follow_up(raw: &str) -> Result<String, ParseError> {
    let text = strip_json_fences(raw);

    // A model that ignores the plain-text instruction may still send an array.
    if let Some(first) = parse_structured(text).and_then(|q| q.into_iter().next()) {
        return clean_follow_up(&first).ok_or_else(|| ParseError::from_text(raw));
    }

    clean_follow_up(text).ok_or_else(|| ParseError::from_text(raw))
}

/// Greetings share the follow-up cleanup rules: one line of plain text.
pub fn parse_greeting(raw: &str) -> Result<String, ParseError> {
    clean_follow_up(strip_json_fences(raw)).ok_or_else(|| ParseError::from_text(raw))
}

fn clean_follow_up(text: &str) -> Option<String> {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let without_marker = match item_marker().captures(&joined) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).to_string(),
        None => joined,
    };
    let without_label = speaker_label().replace(&without_marker, "").into_owned();
    let cleaned = trim_item(&without_label);

    (!cleaned.is_empty()).then_some(cleaned)
}

/// Strict tier: the whole reply (code fences removed), or the outermost
/// bracketed slice of it, must be a JSON array of strings.
fn parse_structured(raw: &str) -> Option<Vec<String>> {
    let text = strip_json_fences(raw);

    let whole = serde_json::from_str::<Vec<String>>(text).ok();
    let parsed = whole.or_else(|| {
        let start = text.find('[')?;
        let end = text.rfind(']')?;
        if end <= start {
            return None;
        }
        serde_json::from_str::<Vec<String>>(&text[start..=end]).ok()
    })?;

    let questions: Vec<String> = parsed
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(str::to_string)
        .collect();
    (!questions.is_empty()).then_some(questions)
}

/// Pattern tier: each marker line starts an item that runs until the next
/// marker line or the end of the text. Text before the first marker is ignored.
fn parse_enumerated(text: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        if let Some(caps) = item_marker().captures(line) {
            if let Some(done) = current.take() {
                items.push(done);
            }
            current = Some(caps.get(1).map_or("", |m| m.as_str()).to_string());
        } else if let Some(item) = current.as_mut() {
            let line = line.trim();
            if !line.is_empty() {
                item.push(' ');
                item.push_str(line);
            }
        }
    }
    if let Some(done) = current {
        items.push(done);
    }

    items
        .iter()
        .map(|item| trim_item(item))
        .filter(|item| !item.is_empty())
        .collect()
}

fn trim_item(item: &str) -> String {
    item.trim()
        .trim_end_matches(',')
        .trim_matches(|c: char| c.is_whitespace() || QUOTES.contains(&c))
        .to_string()
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
