use crate::types::Answer;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Longest question or answer text kept per entry, in characters.
const MAX_FIELD_CHARS: usize = 200;
/// Per-entry overhead counted against the character budget.
const ENTRY_OVERHEAD: usize = 6;

const HEADER: &str = "Previous questions and answers (for context):";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub q: String,
    pub a: String,
}

impl QaPair {
    fn weight(&self) -> usize {
        self.q.chars().count() + self.a.chars().count() + ENTRY_OVERHEAD
    }
}

/// Recent question/answer pairs fed back into prompts.
///
/// Bounded by pair count and a character budget; the oldest entries go first.
/// With a path set, the list is loaded at construction and rewritten after
/// every change.
#[derive(Debug)]
pub struct QaCache {
    path: Option<PathBuf>,
    max_pairs: usize,
    max_chars: usize,
    pairs: VecDeque<QaPair>,
}

impl QaCache {
    pub fn new(path: Option<PathBuf>, max_pairs: usize, max_chars: usize) -> Self {
        let pairs = path.as_ref().map(Self::load).unwrap_or_default();
        Self {
            path,
            max_pairs,
            max_chars,
            pairs,
        }
    }

    pub fn in_memory(max_pairs: usize, max_chars: usize) -> Self {
        Self::new(None, max_pairs, max_chars)
    }

    fn load(path: &PathBuf) -> VecDeque<QaPair> {
        let Ok(raw) = std::fs::read_to_string(path) else {
            return VecDeque::new();
        };
        match serde_json::from_str(&raw) {
            Ok(pairs) => pairs,
            Err(e) => {
                warn!("Ignoring unreadable QA cache {}: {}", path.display(), e);
                VecDeque::new()
            }
        }
    }

    fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };
        let result = serde_json::to_string(&self.pairs)
            .map_err(std::io::Error::other)
            .and_then(|json| std::fs::write(path, json));
        if let Err(e) = result {
            warn!("Failed to persist QA cache to {}: {}", path.display(), e);
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn pairs(&self) -> impl Iterator<Item = &QaPair> {
        self.pairs.iter()
    }

    pub fn add(&mut self, question: &str, answer: &Answer) {
        self.pairs.push_back(QaPair {
            q: single_line(question),
            a: single_line(&answer.to_string()),
        });
        while self.pairs.len() > self.max_pairs {
            self.pairs.pop_front();
        }
        while !self.pairs.is_empty() && self.total_chars() > self.max_chars {
            self.pairs.pop_front();
        }
        debug!("QA cache holds {} pairs", self.pairs.len());
        self.save();
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
        self.save();
    }

    fn total_chars(&self) -> usize {
        self.pairs.iter().map(QaPair::weight).sum()
    }

    /// Prompt block; empty when nothing is cached.
    pub fn as_text(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let lines: Vec<String> = self
            .pairs
            .iter()
            .map(|p| format!("- Q: {} | A: {}", p.q, p.a))
            .collect();
        format!("{}\n{}", HEADER, lines.join("\n"))
    }
}

fn single_line(s: &str) -> String {
    s.trim().replace('\n', " ").chars().take(MAX_FIELD_CHARS).collect()
}
