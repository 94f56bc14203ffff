//! Requirement extraction — turns a job description into the RequirementTerm set.
//!
//! Normalized terms are the job's dictionary hits; open-vocabulary terms come
//! from the extractor. A term whose every occurrence sits under a
//! Preferred/Nice-to-have header gets `preferred_weight`, everything else 1.0.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::matching::normalization::Term;
use crate::matching::open_vocab::OpenVocabExtractor;
use crate::matching::scoring::ScoringConfig;
use crate::matching::sections::{SectionKind, SectionMap};
use crate::matching::tokenizer::{CanonicalDocument, Span};

/// Which matcher discovered a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermChannel {
    Normalized,
    OpenVocabulary,
}

fn default_weight() -> f64 {
    1.0
}

/// A term the job asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementTerm {
    pub term: Term,
    pub channel: TermChannel,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Canonical key of the concept. Terms sharing it form one OR-group of the
    /// Boolean query. Empty means "the term's own key".
    #[serde(default)]
    pub cluster: String,
}

impl RequirementTerm {
    pub fn new(label: &str, channel: TermChannel) -> Self {
        let term = Term::new(label);
        Self {
            cluster: term.key(),
            term,
            channel,
            weight: default_weight(),
        }
    }

    pub fn normalized(label: &str) -> Self {
        Self::new(label, TermChannel::Normalized)
    }

    pub fn open_vocabulary(label: &str) -> Self {
        Self::new(label, TermChannel::OpenVocabulary)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Key looked up in the résumé document.
    pub fn match_key(&self) -> String {
        if self.cluster.is_empty() {
            self.term.key()
        } else {
            self.cluster.clone()
        }
    }
}

/// Normalized terms first (first-occurrence order), then open-vocabulary terms.
pub fn extract_requirements(
    job_text: &str,
    job: &CanonicalDocument,
    config: &ScoringConfig,
) -> Vec<RequirementTerm> {
    let sections = SectionMap::detect(job_text);
    let importance = |spans: &[Span]| -> f64 {
        let only_preferred = !spans.is_empty()
            && spans
                .iter()
                .all(|s| sections.kind_at(s.start) == SectionKind::Preferred);
        if only_preferred {
            config.preferred_weight
        } else {
            default_weight()
        }
    };

    let mut seen = HashSet::new();
    let mut requirements: Vec<RequirementTerm> = Vec::new();
    for token in job.tokens().iter().filter(|t| t.dictionary) {
        if !seen.insert(token.key.clone()) {
            continue;
        }
        let spans = job.find(&token.key);
        requirements.push(
            RequirementTerm::normalized(token.term.as_str()).with_weight(importance(&spans)),
        );
    }

    let extractor = OpenVocabExtractor::new(
        &config.open_vocab,
        config.max_open_vocab_terms,
        config.max_ngram_length,
    );
    for candidate in extractor.candidates(job) {
        let spans = job.find(&candidate.key);
        requirements.push(
            RequirementTerm::open_vocabulary(candidate.term.as_str())
                .with_weight(importance(&spans)),
        );
    }

    tracing::debug!(
        normalized = seen.len(),
        open_vocabulary = requirements.len() - seen.len(),
        "Extracted job requirements"
    );
    requirements
}
