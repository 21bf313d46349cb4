//! Heuristic item kind suggestion for free text.
//!
//! Scores each kind from structural cues (checkbox and bullet lines) and
//! keyword hits, then picks the highest score. Ties resolve in
//! `Note`, `TodoList`, `List` order.

use super::item::ItemKind;
use once_cell::sync::Lazy;
use regex::Regex;

static CHECKBOX_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+]\s*)?\[[ xX]\]").expect("valid checkbox regex"));
static BULLET_LINE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+\S").expect("valid bullet regex"));
static TODO_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:todo|to-do|tasks?|buy|call|email|finish|fix|remember|pick up|pay|submit|deadline|due)\b",
    )
    .expect("valid todo keyword regex")
});
static LIST_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:list|ideas|books|movies|films|songs|recipes|places|gifts|wishlist|favou?rites|collection|links)\b",
    )
    .expect("valid list keyword regex")
});

const CHECKBOX_WEIGHT: f32 = 3.0;
const BULLET_WEIGHT: f32 = 2.0;
const KEYWORD_WEIGHT: f32 = 1.5;
const MAX_COUNTED_LINES: usize = 5;
const MAX_COUNTED_KEYWORDS: usize = 3;
const NOTE_BASE_SCORE: f32 = 1.0;
const NOTE_PROSE_CHARS: usize = 200;
const MAX_NOTE_PROSE_BONUS: f32 = 2.0;

/// Suggested kind with a confidence in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindSuggestion {
    pub kind: ItemKind,
    pub confidence: f32,
}

/// Suggests an item kind for `text`.
pub fn detect_item_kind(text: &str) -> KindSuggestion {
    let mut checkbox_lines = 0usize;
    let mut bullet_lines = 0usize;
    for line in text.lines() {
        if CHECKBOX_LINE_RE.is_match(line) {
            checkbox_lines += 1;
        } else if BULLET_LINE_RE.is_match(line) {
            bullet_lines += 1;
        }
    }

    let todo_keywords = TODO_KEYWORD_RE.find_iter(text).count();
    let list_keywords = LIST_KEYWORD_RE.find_iter(text).count();

    let todo_score = CHECKBOX_WEIGHT * checkbox_lines.min(MAX_COUNTED_LINES) as f32
        + KEYWORD_WEIGHT * todo_keywords.min(MAX_COUNTED_KEYWORDS) as f32;
    let list_score = BULLET_WEIGHT * bullet_lines.min(MAX_COUNTED_LINES) as f32
        + KEYWORD_WEIGHT * list_keywords.min(MAX_COUNTED_KEYWORDS) as f32;
    let prose_bonus = (text.chars().count() / NOTE_PROSE_CHARS) as f32;
    let note_score = NOTE_BASE_SCORE + prose_bonus.min(MAX_NOTE_PROSE_BONUS);

    let scores = [
        (ItemKind::Note, note_score),
        (ItemKind::TodoList, todo_score),
        (ItemKind::List, list_score),
    ];
    let (kind, best) = scores
        .iter()
        .copied()
        .fold((ItemKind::Note, f32::MIN), |acc, candidate| {
            if candidate.1 > acc.1 {
                candidate
            } else {
                acc
            }
        });
    let total: f32 = scores.iter().map(|(_, score)| score).sum();

    KindSuggestion {
        kind,
        confidence: if total > 0.0 { best / total } else { 0.0 },
    }
}
