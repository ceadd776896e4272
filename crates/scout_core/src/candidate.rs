use std::collections::HashSet;

use url::Url;

/// How a candidate was discovered. Purely informational; equality of
/// candidates is decided by URL alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceHint {
    DirectFile,
    Embed,
    Platform,
    PatternMatch,
}

/// A URL believed to reference playable media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaCandidate {
    url: String,
    hint: SourceHint,
}

impl MediaCandidate {
    /// Builds a candidate from an absolute URL. Relative or unparsable
    /// references yield `None`; resolve them against the page first.
    pub fn new(url: &str, hint: SourceHint) -> Option<Self> {
        let trimmed = url.trim();
        let parsed = Url::parse(trimmed).ok()?;
        if parsed.cannot_be_a_base() {
            return None;
        }
        Some(Self {
            url: trimmed.to_string(),
            hint,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn hint(&self) -> SourceHint {
        self.hint
    }
}

/// The result set of one scan: unique by exact URL string.
///
/// Iteration follows insertion order, but callers must only rely on the
/// set semantics; `PartialEq` ignores order.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    items: Vec<MediaCandidate>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a candidate; returns `false` if the URL was already present.
    /// The first hint recorded for a URL wins.
    pub fn insert(&mut self, candidate: MediaCandidate) -> bool {
        if !self.seen.insert(candidate.url.clone()) {
            return false;
        }
        self.items.push(candidate);
        true
    }

    /// Convenience for `MediaCandidate::new` followed by `insert`.
    pub fn insert_url(&mut self, url: &str, hint: SourceHint) -> bool {
        match MediaCandidate::new(url, hint) {
            Some(candidate) => self.insert(candidate),
            None => false,
        }
    }

    pub fn extend(&mut self, other: CandidateSet) {
        for candidate in other.items {
            self.insert(candidate);
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.seen.contains(url)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaCandidate> {
        self.items.iter()
    }

    pub fn urls(&self) -> Vec<String> {
        self.items.iter().map(|c| c.url.clone()).collect()
    }

    pub fn into_vec(self) -> Vec<MediaCandidate> {
        self.items
    }
}

impl PartialEq for CandidateSet {
    fn eq(&self, other: &Self) -> bool {
        self.seen == other.seen
    }
}

impl Eq for CandidateSet {}

impl IntoIterator for CandidateSet {
    type Item = MediaCandidate;
    type IntoIter = std::vec::IntoIter<MediaCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<MediaCandidate> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = MediaCandidate>>(iter: I) -> Self {
        let mut set = CandidateSet::new();
        for candidate in iter {
            set.insert(candidate);
        }
        set
    }
}
