//! Speech text preparation: sentence splitting, pronunciation replacement
//! and cleanup of markup that reads badly aloud.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static SENTENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^.!?]+[.!?]+\s*|[^.!?]+$").expect("sentence regex"));

static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").expect("link regex"));

static BRACKETED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("bracket regex"));

/// Splits a message into sentences: runs of non-terminators followed by one
/// or more of `.`, `!`, `?` (plus trailing whitespace); any trailing
/// fragment forms the last sentence. Empty sentences are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A compiled pronunciation map: case-insensitive whole-word term to
/// replacement spelling.
#[derive(Debug, Default)]
pub struct Pronunciations {
    rules: Vec<(Regex, String)>,
}

impl Pronunciations {
    pub fn compile(map: &HashMap<String, String>) -> Self {
        let mut rules = Vec::with_capacity(map.len());
        for (term, replacement) in map {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
            match Regex::new(&pattern) {
                Ok(re) => rules.push((re, replacement.clone())),
                Err(e) => tracing::warn!(term = %term, error = %e, "skipping unusable pronunciation"),
            }
        }
        Self { rules }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (re, replacement) in &self.rules {
            out = re.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    }
}

/// Prepares already-sanitised text for a TTS engine: flattens markdown links
/// to their label, removes leftover bracketed markers, strips URL schemes
/// and applies the pronunciation map.
pub fn prepare_for_speech(text: &str, pronunciations: &Pronunciations) -> String {
    let flattened = MARKDOWN_LINK_RE.replace_all(text, "$1");
    let unbracketed = BRACKETED_RE.replace_all(&flattened, "");
    let without_schemes = unbracketed.replace("https://", "").replace("http://", "");
    pronunciations.apply(&without_schemes).trim().to_string()
}
