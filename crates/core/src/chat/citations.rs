use std::collections::HashSet;

use atelier_llm::Source;

/// Collects grounding sources for one reply, deduplicated by `uri`.
///
/// Entries keep first-seen order and are never removed or reordered, even when
/// a later chunk reports a smaller citation list than an earlier one.
#[derive(Debug, Clone, Default)]
pub struct CitationAggregator {
    sources: Vec<Source>,
    seen: HashSet<String>,
}

impl CitationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds unseen candidates and returns how many were new.
    pub fn offer<I>(&mut self, candidates: I) -> usize
    where
        I: IntoIterator<Item = Source>,
    {
        let before = self.sources.len();
        for candidate in candidates {
            if self.seen.insert(candidate.uri.clone()) {
                self.sources.push(candidate);
            }
        }
        self.sources.len() - before
    }

    /// Copy of the collected sources, or `None` while nothing was collected.
    pub fn snapshot(&self) -> Option<Vec<Source>> {
        if self.sources.is_empty() {
            None
        } else {
            Some(self.sources.clone())
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
