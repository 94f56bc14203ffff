//! Open-Vocabulary Extractor — finds requirement phrases in a job description
//! that the Normalization Map does not know about.
//!
//! Candidates are n-grams inside runs of eligible tokens (not a dictionary hit,
//! not a stop word, not generic filler, not a bare number) of one clause.
//! Each candidate is scored with tunable weights:
//!
//! ```text
//! score = frequency_weight × occurrences
//!       + trigger_weight   × [some occurrence starts within trigger_window words
//!                             after a trigger phrase, same sentence]
//!       + length_weight    × (words − 1)
//! ```
//!
//! Candidates under `min_score` or shorter than `min_term_chars` are dropped.
//! The rest are taken by score (ties: earlier first occurrence, then longer
//! phrase, then key), skipping any that is a sub- or super-phrase of one
//! already taken, up to `max_terms`. Output is in first-occurrence order.
//! Nothing here depends on hash order, clocks or external corpora.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::matching::normalization::Term;
use crate::matching::requirements::RequirementTerm;
use crate::matching::tokenizer::{is_stop_word, CanonicalDocument, CanonicalToken, Span};

/// Phrases that announce a requirement ("experience with X", "Preferred: X").
const TRIGGERS: &[&str] = &[
    "background in",
    "bonus",
    "experience in",
    "experience with",
    "expertise in",
    "familiarity with",
    "knowledge of",
    "must have",
    "nice to have",
    "preferred",
    "proficiency in",
    "proficient in",
    "qualifications",
    "required",
    "requirements",
    "skilled in",
];

/// Words too generic to be a requirement on their own or inside one.
const GENERIC_WORDS: &[&str] = &[
    "ability", "background", "candidate", "excellent", "experience", "experienced", "expertise",
    "familiarity", "good", "great", "hands-on", "knowledge", "plus", "proficiency", "proficient",
    "qualifications", "requirements", "responsibilities", "role", "skilled", "skills", "strong",
    "team", "understanding", "year", "years",
];

/// Heuristic knobs of the extractor. Defaults favour phrases that are either
/// announced by a trigger or repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenVocabParams {
    pub frequency_weight: f64,
    pub trigger_weight: f64,
    pub length_weight: f64,
    pub min_score: f64,
    /// Words after a trigger phrase that still count as "near" it.
    pub trigger_window: usize,
    pub min_term_chars: usize,
}

impl Default for OpenVocabParams {
    fn default() -> Self {
        Self {
            frequency_weight: 1.0,
            trigger_weight: 2.0,
            length_weight: 0.5,
            min_score: 2.5,
            trigger_window: 8,
            min_term_chars: 2,
        }
    }
}

/// A scored open-vocabulary phrase with its evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenVocabCandidate {
    pub term: Term,
    pub key: String,
    pub occurrences: u32,
    pub triggered: bool,
    pub score: f64,
    pub first_position: usize,
    pub first_span: Span,
    pub word_count: usize,
}

pub struct OpenVocabExtractor<'a> {
    params: &'a OpenVocabParams,
    max_terms: usize,
    max_ngram_length: usize,
}

impl<'a> OpenVocabExtractor<'a> {
    pub fn new(params: &'a OpenVocabParams, max_terms: usize, max_ngram_length: usize) -> Self {
        Self {
            params,
            max_terms,
            max_ngram_length: max_ngram_length.max(1),
        }
    }

    /// Open-vocabulary requirement terms of a job document, importance 1.0.
    pub fn extract(&self, job: &CanonicalDocument) -> Vec<RequirementTerm> {
        self.candidates(job)
            .into_iter()
            .map(|c| RequirementTerm::open_vocabulary(c.term.as_str()))
            .collect()
    }

    /// Selected candidates with their scores, in first-occurrence order.
    pub fn candidates(&self, job: &CanonicalDocument) -> Vec<OpenVocabCandidate> {
        if self.max_terms == 0 || job.is_empty() {
            return Vec::new();
        }
        let triggers = trigger_ends(job.tokens());
        let mut pool: HashMap<String, OpenVocabCandidate> = HashMap::new();

        for run in eligible_runs(job.tokens()) {
            for start in 0..run.len() {
                let longest = self.max_ngram_length.min(run.len() - start);
                for width in 1..=longest {
                    let window = &run[start..start + width];
                    let key = window.iter().map(|t| t.key.as_str()).collect::<Vec<_>>().join(" ");
                    if key.chars().count() < self.params.min_term_chars {
                        continue;
                    }
                    let first = window[0];
                    let last = window[width - 1];
                    let near_trigger = triggers.iter().any(|&(sentence, end)| {
                        sentence == first.sentence
                            && first.position >= end
                            && first.position < end + self.params.trigger_window
                    });
                    pool.entry(key.clone())
                        .and_modify(|c| {
                            c.occurrences += 1;
                            c.triggered |= near_trigger;
                        })
                        .or_insert_with(|| OpenVocabCandidate {
                            term: Term::new(
                                &window.iter().map(|t| t.surface.as_str()).collect::<Vec<_>>().join(" "),
                            ),
                            key,
                            occurrences: 1,
                            triggered: near_trigger,
                            score: 0.0,
                            first_position: first.position,
                            first_span: Span {
                                start: first.span.start,
                                end: last.span.end,
                            },
                            word_count: width,
                        });
                }
            }
        }

        let mut ranked: Vec<OpenVocabCandidate> = pool
            .into_values()
            .map(|mut c| {
                c.score = self.score(&c);
                c
            })
            .filter(|c| c.score >= self.params.min_score)
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.first_position.cmp(&b.first_position))
                .then(b.word_count.cmp(&a.word_count))
                .then(a.key.cmp(&b.key))
        });

        let mut selected: Vec<OpenVocabCandidate> = Vec::new();
        for candidate in ranked {
            if selected.len() == self.max_terms {
                break;
            }
            if selected.iter().any(|s| phrases_overlap(&s.key, &candidate.key)) {
                continue;
            }
            selected.push(candidate);
        }
        selected.sort_by(|a, b| {
            a.first_position
                .cmp(&b.first_position)
                .then(b.word_count.cmp(&a.word_count))
        });
        selected
    }

    fn score(&self, c: &OpenVocabCandidate) -> f64 {
        let p = self.params;
        p.frequency_weight * f64::from(c.occurrences)
            + if c.triggered { p.trigger_weight } else { 0.0 }
            + p.length_weight * (c.word_count.saturating_sub(1)) as f64
    }
}

fn is_eligible(token: &CanonicalToken) -> bool {
    !token.dictionary
        && !is_stop_word(&token.key)
        && GENERIC_WORDS.binary_search(&token.key.as_str()).is_err()
        && token.key.chars().any(char::is_alphabetic)
}

/// Maximal runs of eligible tokens that stay inside one clause.
fn eligible_runs(tokens: &[CanonicalToken]) -> Vec<Vec<&CanonicalToken>> {
    let mut runs = Vec::new();
    let mut current: Vec<&CanonicalToken> = Vec::new();
    for token in tokens {
        let breaks = current.last().is_some_and(|prev| prev.clause != token.clause);
        if breaks || !is_eligible(token) {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
        }
        if is_eligible(token) {
            current.push(token);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// (sentence, word position right after the trigger) for every trigger occurrence.
fn trigger_ends(tokens: &[CanonicalToken]) -> Vec<(usize, usize)> {
    let mut ends = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        for trigger in TRIGGERS {
            let words: Vec<&str> = trigger.split(' ').collect();
            let Some(window) = tokens.get(i..i + words.len()) else {
                continue;
            };
            let same_sentence = window.iter().all(|t| t.sentence == token.sentence);
            if same_sentence && window.iter().zip(&words).all(|(t, w)| t.key == *w) {
                let last = &window[window.len() - 1];
                ends.push((token.sentence, last.position + last.word_count));
            }
        }
    }
    ends
}

/// True when one phrase is a contiguous word sub-sequence of the other.
fn phrases_overlap(a: &str, b: &str) -> bool {
    let a: Vec<&str> = a.split(' ').collect();
    let b: Vec<&str> = b.split(' ').collect();
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    long.windows(short.len()).any(|w| w == short.as_slice())
}
