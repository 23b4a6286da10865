//! Fuzzy label/file resolution.
//!
//! Two related primitives live here. Set-similarity matching associates
//! node labels with repository file paths (used by projection to backfill
//! missing `related_files`). Term-containment scoring resolves a free-text
//! prompt to candidate scope nodes. Neither ever errors on a miss — an
//! empty result means "not found" and the caller decides what that means.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::types::NodeDoc;
use crate::identity::NodeKey;

/// Minimum Jaccard similarity for a file association to be accepted.
pub const SIMILARITY_THRESHOLD: f32 = 0.45;

/// Maximum number of fuzzy file suggestions attached to one node.
pub const MAX_FILE_SUGGESTIONS: usize = 2;

/// Salient-term cap for prompt-to-scope resolution.
pub const MAX_SCOPE_TERMS: usize = 6;

/// Noise words stripped from prompts before scope matching. The original
/// user base wrote prompts in Korean, so the list carries both scripts.
const STOP_WORDS: &[&str] = &[
    "수정", "삭제", "추가", "정리", "관련", "기능", "필드", "코드", "매퍼", "쿼리", "테스트",
    "해주세요", "해줘", "에서", "의", "및", "please", "update", "delete", "add", "fix", "the",
    "and", "for", "code", "file",
];

/// A fuzzy file association with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSuggestion {
    pub path: String,
    pub score: f32,
}

/// A scope node candidate resolved from a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeCandidate {
    pub key: NodeKey,
    pub label: String,
    pub score: f32,
}

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Split one identifier on camel-case boundaries and `_`, `-`, `.`,
/// lowercase everything, and drop single-character tokens.
pub fn tokenize_identifier(identifier: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for piece in identifier.split(|c: char| c == '_' || c == '-' || c == '.') {
        let mut current = String::new();
        let chars: Vec<char> = piece.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_numeric());
            let next_lower = chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            // Boundary: aB, and the B of "HTTPServer" -> "http" | "server".
            if c.is_uppercase() && !current.is_empty() && (prev_lower || next_lower) {
                push_token(&mut tokens, &current);
                current.clear();
            }
            current.push(c);
        }
        push_token(&mut tokens, &current);
    }
    tokens
}

fn push_token(tokens: &mut HashSet<String>, raw: &str) {
    let lowered = raw.to_lowercase();
    if lowered.chars().count() > 1 {
        tokens.insert(lowered);
    }
}

/// Token set of a file name: final path segment, extension stripped.
pub fn tokenize_filename(path: &str) -> HashSet<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    tokenize_identifier(stem)
}

/// Token set of a node label: alphanumeric runs, camel-split.
pub fn tokenize_label(label: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    let mut run = String::new();
    for c in label.chars() {
        if c.is_alphanumeric() {
            run.push(c);
        } else if !run.is_empty() {
            tokens.extend(tokenize_identifier(&run));
            run.clear();
        }
    }
    if !run.is_empty() {
        tokens.extend(tokenize_identifier(&run));
    }
    tokens
}

/// Jaccard similarity of two token sets: `|a ∩ b| / |a ∪ b|`.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f32 / union as f32
}

/// Score every candidate path against a label and keep the best matches.
///
/// Candidates at or above `threshold` are ranked by descending score, then
/// ascending path length (shorter paths read as more canonical),
/// deduplicated by path and capped at `limit`.
pub fn suggest_files<'a, I>(
    label: &str,
    candidates: I,
    threshold: f32,
    limit: usize,
) -> Vec<FileSuggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let label_tokens = tokenize_label(label);
    if label_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<FileSuggestion> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for path in candidates {
        if !seen.insert(path) {
            continue;
        }
        let score = jaccard(&label_tokens, &tokenize_filename(path));
        if score >= threshold {
            scored.push(FileSuggestion {
                path: path.to_string(),
                score,
            });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.path.len().cmp(&b.path.len()))
    });
    scored.truncate(limit);
    scored
}

/// Extract up to `max_terms` salient terms from a free-text prompt.
///
/// Keeps alphanumeric/Hangul runs of length ≥ 2, strips the stop-word
/// list, and deduplicates case-insensitively, preserving first-seen order.
pub fn extract_scope_terms(prompt: &str, max_terms: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut run = String::new();

    let flush = |run: &mut String, out: &mut Vec<String>, seen: &mut HashSet<String>| {
        if run.chars().count() >= 2 {
            let lowered = run.to_lowercase();
            if !STOP_WORDS.contains(&lowered.as_str()) && seen.insert(lowered) {
                out.push(run.clone());
            }
        }
        run.clear();
    };

    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || is_hangul(c) {
            run.push(c);
        } else {
            flush(&mut run, &mut out, &mut seen);
        }
    }
    flush(&mut run, &mut out, &mut seen);

    out.truncate(max_terms);
    out
}

/// Resolve a prompt to scope node candidates by substring containment.
///
/// Each term found in a node's lowercased label scores 2.0; an exact match
/// against the label with spaces removed adds 1.0. Nodes scoring zero are
/// dropped. An empty term set or no positive score yields an empty list —
/// "scope not found", not an error.
pub fn resolve_scope<'a, I>(nodes: I, prompt: &str, max_terms: usize, top_n: usize) -> Vec<ScopeCandidate>
where
    I: IntoIterator<Item = &'a NodeDoc>,
{
    let terms = extract_scope_terms(prompt, max_terms);
    if terms.is_empty() {
        return Vec::new();
    }
    let lowered_terms: Vec<String> = terms.iter().map(|t| t.to_lowercase()).collect();

    let mut scored: Vec<ScopeCandidate> = Vec::new();
    for node in nodes {
        let label_lower = node.label.to_lowercase();
        let compact = label_lower.replace(' ', "");

        let mut score = 0.0f32;
        for term in &lowered_terms {
            if label_lower.contains(term.as_str()) {
                score += 2.0;
            }
        }
        if lowered_terms.iter().any(|t| t == &compact) {
            score += 1.0;
        }
        if score > 0.0 {
            scored.push(ScopeCandidate {
                key: node.key.clone(),
                label: node.label.clone(),
                score,
            });
        }
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_n);
    scored
}
