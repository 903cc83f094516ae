use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Sparse term -> weight map. A missing key means weight 0.
pub type SparseVector = BTreeMap<String, f64>;

/// Corpus-wide term statistics produced by [`fit`]. Never mutated after fitting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermStats {
    pub document_frequency: BTreeMap<String, u32>,
    pub corpus_size: usize,
    pub idf: BTreeMap<String, f64>,
}

impl TermStats {
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.document_frequency.keys().map(String::as_str)
    }

    pub fn vocabulary_size(&self) -> usize { self.document_frequency.len() }

    pub fn contains(&self, term: &str) -> bool { self.document_frequency.contains_key(term) }

    pub fn idf(&self, term: &str) -> f64 { self.idf.get(term).copied().unwrap_or(0.0) }
}

/// Smoothed idf; strictly positive for any `df <= corpus_size`.
pub fn smoothed_idf(corpus_size: usize, df: u32) -> f64 {
    ((1.0 + corpus_size as f64) / (1.0 + df as f64)).ln() + 1.0
}

/// Count chunk-level document frequencies over the whole corpus, then derive idf.
pub fn fit<S: AsRef<str>>(corpus: &[Vec<S>]) -> TermStats {
    let mut document_frequency: BTreeMap<String, u32> = BTreeMap::new();
    for tokens in corpus {
        let distinct: BTreeSet<&str> = tokens.iter().map(AsRef::as_ref).collect();
        for term in distinct {
            *document_frequency.entry(term.to_string()).or_insert(0) += 1;
        }
    }
    let corpus_size = corpus.len();
    let idf = document_frequency
        .iter()
        .map(|(term, &df)| (term.clone(), smoothed_idf(corpus_size, df)))
        .collect();
    TermStats { document_frequency, corpus_size, idf }
}

/// Weight each distinct term by `(count / len) * idf`. Unseen terms are left out.
pub fn transform<S: AsRef<str>>(tokens: &[S], stats: &TermStats) -> SparseVector {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in tokens {
        *counts.entry(t.as_ref()).or_insert(0) += 1;
    }
    let len = tokens.len() as f64;
    counts
        .into_iter()
        .filter_map(|(term, c)| {
            let idf = stats.idf(term);
            (idf > 0.0).then(|| (term.to_string(), (c as f64 / len) * idf))
        })
        .collect()
}
