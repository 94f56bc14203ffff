//! Scoring Channel Combiner — merges three independent match signals into one
//! composite score with per-term attribution.
//!
//! Channels:
//! 1. `normalized_overlap`   — weighted share of dictionary requirements found.
//! 2. `open_vocab_overlap`   — weighted share of open-vocabulary requirements found.
//! 3. `boolean_satisfaction` — 1.0 when the job's Boolean query holds, else the
//!    share of its top-level groups that hold.
//!
//! A channel with nothing to measure (no terms of its kind, or an empty query)
//! is inactive and drops out of the composite, so a résumé that covers every
//! requirement always scores 1.0 and one that covers none scores 0.0.

use serde::{Deserialize, Serialize};

use crate::errors::ScoringError;
use crate::matching::boolean::{build_query, evaluate, BooleanQuery, Evaluation, QueryTerm};
use crate::matching::normalization::{NormalizationMap, Term};
use crate::matching::open_vocab::OpenVocabParams;
use crate::matching::requirements::{RequirementTerm, TermChannel};
use crate::matching::tokenizer::{CanonicalDocument, Span};

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelWeights {
    pub normalized_overlap: f64,
    pub open_vocab_overlap: f64,
    pub boolean_satisfaction: f64,
}

impl Default for ChannelWeights {
    fn default() -> Self {
        Self {
            normalized_overlap: 1.0 / 3.0,
            open_vocab_overlap: 1.0 / 3.0,
            boolean_satisfaction: 1.0 / 3.0,
        }
    }
}

impl ChannelWeights {
    pub fn get(&self, channel: ScoreChannel) -> f64 {
        match channel {
            ScoreChannel::NormalizedOverlap => self.normalized_overlap,
            ScoreChannel::OpenVocabOverlap => self.open_vocab_overlap,
            ScoreChannel::BooleanSatisfaction => self.boolean_satisfaction,
        }
    }

    /// Each weight finite and non-negative, sum 1.0 within 1e-6. Weights are
    /// never renormalized.
    pub fn validate(&self) -> Result<(), ScoringError> {
        for channel in ScoreChannel::ALL {
            let weight = self.get(channel);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoringError::config(format!(
                    "weight for {} must be a finite number >= 0 (got {weight})",
                    channel.as_str()
                )));
            }
        }
        let sum: f64 = ScoreChannel::ALL.iter().map(|c| self.get(*c)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ScoringError::config(format!(
                "channel weights must sum to 1.0 (got {sum})"
            )));
        }
        Ok(())
    }
}

/// Everything that tunes a scoring call. Missing keys take their defaults,
/// unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub channel_weights: ChannelWeights,
    pub max_open_vocab_terms: usize,
    pub max_ngram_length: usize,
    /// Importance of requirements that only appear under a Preferred header.
    pub preferred_weight: f64,
    /// Terms a résumé must not contain. Each becomes a NOT clause of the query.
    pub excluded_terms: Vec<String>,
    pub open_vocab: OpenVocabParams,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            channel_weights: ChannelWeights::default(),
            max_open_vocab_terms: 10,
            max_ngram_length: 3,
            preferred_weight: 0.5,
            excluded_terms: Vec::new(),
            open_vocab: OpenVocabParams::default(),
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        self.channel_weights.validate()?;
        if self.max_open_vocab_terms == 0 {
            return Err(ScoringError::config("max_open_vocab_terms must be > 0"));
        }
        if self.max_ngram_length == 0 {
            return Err(ScoringError::config("max_ngram_length must be >= 1"));
        }
        if !self.preferred_weight.is_finite() || self.preferred_weight <= 0.0 {
            return Err(ScoringError::config(format!(
                "preferred_weight must be a finite number > 0 (got {})",
                self.preferred_weight
            )));
        }
        if self.excluded_terms.iter().any(|t| t.trim().is_empty()) {
            return Err(ScoringError::config("excluded_terms must not contain empty entries"));
        }

        let p = &self.open_vocab;
        let knobs = [
            ("frequency_weight", p.frequency_weight),
            ("trigger_weight", p.trigger_weight),
            ("length_weight", p.length_weight),
            ("min_score", p.min_score),
        ];
        if let Some((name, value)) = knobs.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(ScoringError::config(format!(
                "open_vocab.{name} must be a finite number >= 0 (got {value})"
            )));
        }
        Ok(())
    }

    /// Exclusions as query leaves, canonicalized through `map`.
    pub fn exclusions(&self, map: &NormalizationMap) -> Vec<QueryTerm> {
        let mut out: Vec<QueryTerm> = Vec::new();
        for raw in &self.excluded_terms {
            let term = map.canonicalize(raw);
            let key = term.key();
            if !out.iter().any(|e| e.key == key) {
                out.push(QueryTerm::new(term, key));
            }
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreChannel {
    NormalizedOverlap,
    OpenVocabOverlap,
    BooleanSatisfaction,
}

impl ScoreChannel {
    pub const ALL: [ScoreChannel; 3] = [
        ScoreChannel::NormalizedOverlap,
        ScoreChannel::OpenVocabOverlap,
        ScoreChannel::BooleanSatisfaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreChannel::NormalizedOverlap => "normalized_overlap",
            ScoreChannel::OpenVocabOverlap => "open_vocab_overlap",
            ScoreChannel::BooleanSatisfaction => "boolean_satisfaction",
        }
    }
}

/// How much one requirement moved one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermContribution {
    pub term: Term,
    pub matched: bool,
    pub weight: f64,
    pub contribution: f64,
    pub resume_spans: Vec<Span>,
    pub job_spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelScore {
    pub channel: ScoreChannel,
    pub score: f64,
    /// Configured weight, as given.
    pub weight: f64,
    pub active: bool,
    pub contributions: Vec<TermContribution>,
}

/// State of one NOT clause of the Boolean query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRecord {
    pub term: Term,
    /// The résumé contains the excluded term.
    pub present: bool,
    pub contribution: f64,
    pub resume_spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub composite_score: f64,
    pub normalized_overlap: ChannelScore,
    pub open_vocab_overlap: ChannelScore,
    pub boolean_satisfaction: ChannelScore,
    pub unmatched: Vec<RequirementTerm>,
    pub exclusions: Vec<ExclusionRecord>,
    pub weights: ChannelWeights,
}

impl ScoreReport {
    pub fn channels(&self) -> [&ChannelScore; 3] {
        [
            &self.normalized_overlap,
            &self.open_vocab_overlap,
            &self.boolean_satisfaction,
        ]
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

/// Scores a résumé against a job's requirements. `config.excluded_terms` are
/// canonicalized through `map`, the same map the documents were built with.
pub fn score(
    resume: &CanonicalDocument,
    job: &CanonicalDocument,
    requirements: &[RequirementTerm],
    map: &NormalizationMap,
    config: &ScoringConfig,
) -> Result<ScoreReport, ScoringError> {
    let exclusions = config.exclusions(map);
    let query = build_query(requirements, &exclusions);
    score_query(resume, job, requirements, &query, config)
}

pub fn score_query(
    resume: &CanonicalDocument,
    job: &CanonicalDocument,
    requirements: &[RequirementTerm],
    query: &BooleanQuery,
    config: &ScoringConfig,
) -> Result<ScoreReport, ScoringError> {
    config.validate()?;
    if let Some(bad) = requirements
        .iter()
        .find(|r| !r.weight.is_finite() || r.weight <= 0.0)
    {
        return Err(ScoringError::config(format!(
            "requirement '{}' has weight {}; weights must be finite and > 0",
            bad.term, bad.weight
        )));
    }

    let weights = &config.channel_weights;
    let normalized = overlap_channel(
        ScoreChannel::NormalizedOverlap,
        requirements,
        TermChannel::Normalized,
        resume,
        job,
        weights.normalized_overlap,
    );
    let open_vocab = overlap_channel(
        ScoreChannel::OpenVocabOverlap,
        requirements,
        TermChannel::OpenVocabulary,
        resume,
        job,
        weights.open_vocab_overlap,
    );
    let evaluation = evaluate(query, resume, true);
    let (boolean, exclusions) = boolean_channel(&evaluation, job, weights.boolean_satisfaction);

    let composite = composite_score(&[&normalized, &open_vocab, &boolean]);

    let unmatched: Vec<RequirementTerm> = requirements
        .iter()
        .filter(|r| !resume.contains(&r.match_key()))
        .cloned()
        .collect();

    tracing::debug!(
        composite,
        normalized = normalized.score,
        open_vocab = open_vocab.score,
        boolean = boolean.score,
        unmatched = unmatched.len(),
        "Scored résumé"
    );

    Ok(ScoreReport {
        composite_score: composite,
        normalized_overlap: normalized,
        open_vocab_overlap: open_vocab,
        boolean_satisfaction: boolean,
        unmatched,
        exclusions,
        weights: weights.clone(),
    })
}

/// Weighted mean over the active channels. When every active channel is
/// configured with weight 0, the active channels count equally instead.
/// No active channel at all scores 0.
fn composite_score(channels: &[&ChannelScore]) -> f64 {
    let active: Vec<&ChannelScore> = channels.iter().copied().filter(|c| c.active).collect();
    if active.is_empty() {
        return 0.0;
    }
    let active_weight: f64 = active.iter().map(|c| c.weight).sum();
    let mean = if active_weight > 0.0 {
        active.iter().map(|c| c.score * c.weight).sum::<f64>() / active_weight
    } else {
        active.iter().map(|c| c.score).sum::<f64>() / active.len() as f64
    };
    mean.clamp(0.0, 1.0)
}

fn overlap_channel(
    channel: ScoreChannel,
    requirements: &[RequirementTerm],
    kind: TermChannel,
    resume: &CanonicalDocument,
    job: &CanonicalDocument,
    weight: f64,
) -> ChannelScore {
    let terms: Vec<&RequirementTerm> = requirements.iter().filter(|r| r.channel == kind).collect();
    let total: f64 = terms.iter().map(|r| r.weight).sum();

    let mut score = 0.0;
    let mut contributions = Vec::with_capacity(terms.len());
    for requirement in terms {
        let key = requirement.match_key();
        let resume_spans = resume.find(&key);
        let matched = !resume_spans.is_empty();
        let share = requirement.weight / total;
        let contribution = if matched { share } else { 0.0 };
        score += contribution;
        contributions.push(TermContribution {
            term: requirement.term.clone(),
            matched,
            weight: requirement.weight,
            contribution,
            resume_spans,
            job_spans: job.find(&key),
        });
    }

    ChannelScore {
        channel,
        score: score.clamp(0.0, 1.0),
        weight,
        active: !contributions.is_empty(),
        contributions,
    }
}

/// Each top-level group is worth `1 / groups`. A satisfied group's share is
/// split evenly between its matched requirement leaves, or between its NOT
/// leaves when it holds only because something is absent.
///
/// The channel is active only when the query asks for at least one term.
/// A query made of NOT clauses alone still reports its exclusions but
/// contributes nothing.
fn boolean_channel(
    evaluation: &Evaluation,
    job: &CanonicalDocument,
    weight: f64,
) -> (ChannelScore, Vec<ExclusionRecord>) {
    let groups = evaluation.groups_total;
    let active = evaluation.leaves.iter().any(|leaf| !leaf.negated);
    let share = if active { 1.0 / groups as f64 } else { 0.0 };

    let mut credited = vec![0usize; groups];
    let mut absent = vec![0usize; groups];
    for leaf in &evaluation.leaves {
        if leaf.negated && !leaf.matched {
            absent[leaf.group] += 1;
        } else if !leaf.negated && leaf.matched {
            credited[leaf.group] += 1;
        }
    }
    let holds = |group: usize| evaluation.group_results.get(group).copied().unwrap_or(false);

    let mut contributions = Vec::new();
    let mut exclusions = Vec::new();
    for leaf in &evaluation.leaves {
        if leaf.negated {
            let contribution = if holds(leaf.group) && !leaf.matched && credited[leaf.group] == 0 {
                share / absent[leaf.group] as f64
            } else {
                0.0
            };
            exclusions.push(ExclusionRecord {
                term: leaf.term.clone(),
                present: leaf.matched,
                contribution,
                resume_spans: leaf.spans.clone(),
            });
        } else {
            let contribution = if holds(leaf.group) && leaf.matched {
                share / credited[leaf.group] as f64
            } else {
                0.0
            };
            contributions.push(TermContribution {
                term: leaf.term.clone(),
                matched: leaf.matched,
                weight: share,
                contribution,
                resume_spans: leaf.spans.clone(),
                job_spans: job.find(&leaf.key),
            });
        }
    }

    let channel = ChannelScore {
        channel: ScoreChannel::BooleanSatisfaction,
        score: if active { evaluation.partial_score() } else { 0.0 },
        weight,
        active,
        contributions,
    };
    (channel, exclusions)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::matching::requirements::extract_requirements;
    use crate::matching::tokenizer::tokenize;

    const EPS: f64 = 1e-9;

    fn builtin() -> NormalizationMap {
        NormalizationMap::builtin()
    }

    fn doc(text: &str) -> CanonicalDocument {
        tokenize(text, &builtin(), 3)
    }

    fn python_and_distributed() -> Vec<RequirementTerm> {
        vec![
            RequirementTerm::normalized("Python"),
            RequirementTerm::open_vocabulary("distributed systems"),
        ]
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_ngram_length, 3);
        assert_eq!(config.preferred_weight, 0.5);
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let cases = [
            (0.5, 0.5, 0.5),
            (0.3, 0.3, 0.3),
            (-0.5, 0.75, 0.75),
            (f64::NAN, 0.5, 0.5),
            (f64::INFINITY, 0.0, 0.0),
        ];
        for (n, o, b) in cases {
            let weights = ChannelWeights {
                normalized_overlap: n,
                open_vocab_overlap: o,
                boolean_satisfaction: b,
            };
            assert!(
                matches!(weights.validate(), Err(ScoringError::InvalidConfig(_))),
                "weights {n} {o} {b}"
            );
        }
        let exact = ChannelWeights {
            normalized_overlap: 0.5,
            open_vocab_overlap: 0.2,
            boolean_satisfaction: 0.3,
        };
        assert!(exact.validate().is_ok());
    }

    #[test]
    fn test_invalid_config_fields_rejected() {
        let mut config = ScoringConfig::default();
        config.max_open_vocab_terms = 0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.max_ngram_length = 0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.preferred_weight = 0.0;
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.excluded_terms = vec!["  ".into()];
        assert!(config.validate().is_err());

        let mut config = ScoringConfig::default();
        config.open_vocab.min_score = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_score_rejects_invalid_config_without_report() {
        let mut config = ScoringConfig::default();
        config.channel_weights.boolean_satisfaction = 0.9;
        let err = score(
            &doc("Python"),
            &doc("Python"),
            &python_and_distributed(),
            &builtin(),
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_config_json_defaults_and_unknown_keys() {
        let config: ScoringConfig =
            serde_json::from_str(r#"{"max_open_vocab_terms": 4}"#).unwrap();
        assert_eq!(config.max_open_vocab_terms, 4);
        assert_eq!(config.channel_weights, ChannelWeights::default());

        let err = serde_json::from_str::<ScoringConfig>(r#"{"max_terms": 4}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_python_distributed_systems_scenario() {
        let resume = doc("Experienced Python engineer skilled in distributed systems design");
        let job = doc("Python developer with distributed systems experience");
        let report = score(
            &resume,
            &job,
            &python_and_distributed(),
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();

        assert!((report.normalized_overlap.score - 1.0).abs() < EPS);
        assert!((report.open_vocab_overlap.score - 1.0).abs() < EPS);
        assert!((report.boolean_satisfaction.score - 1.0).abs() < EPS);
        assert!((report.composite_score - 1.0).abs() < EPS);
        assert!(report.unmatched.is_empty());

        let python = &report.normalized_overlap.contributions[0];
        assert_eq!(python.resume_spans, vec![Span { start: 12, end: 18 }]);
        assert_eq!(python.job_spans, vec![Span { start: 0, end: 6 }]);
    }

    #[test]
    fn test_py_variant_scenario() {
        let mut map = NormalizationMap::new();
        map.add_variant("py", "Python", false).unwrap();
        let resume = tokenize("5 years py experience", &map, 3);
        let job = tokenize("Python developer", &map, 3);
        let reqs = vec![RequirementTerm::normalized("Python")];
        let report = score(&resume, &job, &reqs, &map, &ScoringConfig::default()).unwrap();

        let python = &report.normalized_overlap.contributions[0];
        assert!(python.matched);
        assert_eq!(python.term.as_str(), "Python");
        assert!((python.contribution - 1.0).abs() < EPS);
        assert!((report.composite_score - 1.0).abs() < EPS);
    }

    #[test]
    fn test_full_match_without_open_vocab_terms() {
        let reqs = vec![
            RequirementTerm::normalized("Rust"),
            RequirementTerm::normalized("Docker"),
        ];
        let report = score(
            &doc("Rust services in Docker"),
            &doc("Rust, Docker"),
            &reqs,
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();
        assert!(!report.open_vocab_overlap.active);
        assert!((report.composite_score - 1.0).abs() < EPS);
    }

    #[test]
    fn test_no_match_scores_zero() {
        let reqs = python_and_distributed();
        let report = score(
            &doc("Pastry chef, sourdough and croissants"),
            &doc("Python developer with distributed systems experience"),
            &reqs,
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();
        assert_eq!(report.composite_score, 0.0);
        assert_eq!(report.unmatched, reqs);
        assert!(report
            .channels()
            .iter()
            .flat_map(|c| &c.contributions)
            .all(|t| t.contribution == 0.0));
    }

    #[test]
    fn test_partial_match_mixes_channels() {
        let reqs = vec![
            RequirementTerm::normalized("Python"),
            RequirementTerm::normalized("Rust"),
            RequirementTerm::open_vocabulary("distributed systems"),
        ];
        let report = score(
            &doc("Python and distributed systems"),
            &doc("Python, Rust, distributed systems"),
            &reqs,
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();
        assert!((report.normalized_overlap.score - 0.5).abs() < EPS);
        assert!((report.open_vocab_overlap.score - 1.0).abs() < EPS);
        assert!((report.boolean_satisfaction.score - 2.0 / 3.0).abs() < EPS);
        let expected = (0.5 + 1.0 + 2.0 / 3.0) / 3.0;
        assert!((report.composite_score - expected).abs() < EPS);
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.unmatched[0].term.as_str(), "Rust");
    }

    #[test]
    fn test_requirement_weights_shape_overlap() {
        let reqs = vec![
            RequirementTerm::normalized("Python"),
            RequirementTerm::normalized("Rust").with_weight(0.5),
        ];
        let config = ScoringConfig::default();
        let report = score(&doc("Python"), &doc("Python, Rust"), &reqs, &builtin(), &config).unwrap();
        assert!((report.normalized_overlap.score - 1.0 / 1.5).abs() < EPS);

        let bad = vec![RequirementTerm::normalized("Python").with_weight(0.0)];
        let err = score(&doc("Python"), &doc("Python"), &bad, &builtin(), &config);
        assert!(matches!(err, Err(ScoringError::InvalidConfig(_))));
    }

    #[test]
    fn test_exclusions_fail_boolean_channel() {
        let mut config = ScoringConfig::default();
        config.excluded_terms = vec!["COBOL".into()];
        let reqs = vec![RequirementTerm::normalized("Java")];

        let clean = score(&doc("Java services"), &doc("Java"), &reqs, &builtin(), &config).unwrap();
        assert!((clean.boolean_satisfaction.score - 1.0).abs() < EPS);
        assert_eq!(clean.exclusions.len(), 1);
        assert!(!clean.exclusions[0].present);
        assert!((clean.exclusions[0].contribution - 0.5).abs() < EPS);

        let tainted =
            score(&doc("Java and COBOL"), &doc("Java"), &reqs, &builtin(), &config).unwrap();
        assert!((tainted.boolean_satisfaction.score - 0.5).abs() < EPS);
        assert!(tainted.exclusions[0].present);
        assert_eq!(tainted.exclusions[0].contribution, 0.0);
    }

    #[test]
    fn test_boolean_contributions_sum_to_score() {
        let reqs = vec![
            RequirementTerm::normalized("Python"),
            RequirementTerm::normalized("py").with_cluster("python"),
            RequirementTerm::normalized("Kafka"),
        ];
        let config = ScoringConfig::default();
        let report = score(&doc("Python"), &doc("Python"), &reqs, &builtin(), &config).unwrap();
        let boolean = &report.boolean_satisfaction;
        let sum: f64 = boolean.contributions.iter().map(|c| c.contribution).sum();
        assert!((boolean.score - 0.5).abs() < EPS);
        assert!((sum - boolean.score).abs() < EPS);
        assert_eq!(boolean.contributions.len(), 3);
    }

    #[test]
    fn test_contributions_only_name_requirements() {
        let reqs = vec![
            RequirementTerm::normalized("Python"),
            RequirementTerm::open_vocabulary("event sourcing"),
        ];
        let report = score(
            &doc("Python with event sourcing and Go"),
            &doc("Python, event sourcing"),
            &reqs,
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();
        for channel in report.channels() {
            for contribution in &channel.contributions {
                assert!(reqs.iter().any(|r| r.term == contribution.term));
            }
        }
    }

    #[test]
    fn test_exclusions_go_through_the_map() {
        let mut config = ScoringConfig::default();
        config.excluded_terms = vec!["k8s".into()];
        let reqs = vec![RequirementTerm::normalized("Python")];
        let report = score(
            &doc("Python and k8s"),
            &doc("Python"),
            &reqs,
            &builtin(),
            &config,
        )
        .unwrap();
        assert_eq!(report.exclusions[0].term.as_str(), "Kubernetes");
        assert!(report.exclusions[0].present);
        assert!((report.boolean_satisfaction.score - 0.5).abs() < EPS);
    }

    #[test]
    fn test_zero_weight_active_channels_count_equally() {
        let mut config = ScoringConfig::default();
        config.channel_weights = ChannelWeights {
            normalized_overlap: 1.0,
            open_vocab_overlap: 0.0,
            boolean_satisfaction: 0.0,
        };
        let reqs = vec![RequirementTerm::open_vocabulary("distributed systems")];
        let full = score(
            &doc("distributed systems"),
            &doc("distributed systems"),
            &reqs,
            &builtin(),
            &config,
        )
        .unwrap();
        assert!(!full.normalized_overlap.active);
        assert!((full.composite_score - 1.0).abs() < EPS);

        let none = score(&doc("pastry"), &doc("distributed systems"), &reqs, &builtin(), &config)
            .unwrap();
        assert_eq!(none.composite_score, 0.0);
    }

    #[test]
    fn test_exclusions_alone_leave_boolean_inactive() {
        let mut config = ScoringConfig::default();
        config.excluded_terms = vec!["COBOL".into()];
        let report = score(&doc("Java"), &doc(""), &[], &builtin(), &config).unwrap();
        assert!(!report.boolean_satisfaction.active);
        assert_eq!(report.boolean_satisfaction.score, 0.0);
        assert_eq!(report.composite_score, 0.0);
        assert_eq!(report.exclusions.len(), 1);
        assert_eq!(report.exclusions[0].contribution, 0.0);
    }

    fn text() -> impl Strategy<Value = String> {
        let word = prop_oneof![
            Just("Python".to_string()),
            Just("py".to_string()),
            Just("k8s".to_string()),
            Just("distributed systems".to_string()),
            Just("experience with".to_string()),
            Just("Preferred:".to_string()),
            Just(",\n".to_string()),
            "[a-z]{1,10}",
        ];
        prop::collection::vec(word, 0..24).prop_map(|words| words.join(" "))
    }

    fn weights() -> impl Strategy<Value = ChannelWeights> {
        (0u32..=4, 0u32..=4, 0u32..=4)
            .prop_filter("at least one weight", |(a, b, c)| a + b + c > 0)
            .prop_map(|(a, b, c)| {
                let sum = f64::from(a + b + c);
                ChannelWeights {
                    normalized_overlap: f64::from(a) / sum,
                    open_vocab_overlap: f64::from(b) / sum,
                    boolean_satisfaction: f64::from(c) / sum,
                }
            })
    }

    fn run(resume: &str, job: &str, config: &ScoringConfig) -> ScoreReport {
        let map = builtin();
        let job_doc = tokenize(job, &map, config.max_ngram_length);
        let reqs = extract_requirements(job, &job_doc, config);
        let resume_doc = tokenize(resume, &map, config.max_ngram_length);
        score(&resume_doc, &job_doc, &reqs, &map, config).unwrap()
    }

    proptest! {
        #[test]
        fn composite_is_bounded_and_deterministic(
            resume in text(),
            job in text(),
            channel_weights in weights(),
        ) {
            let config = ScoringConfig { channel_weights, ..ScoringConfig::default() };
            let first = run(&resume, &job, &config);
            prop_assert!((0.0..=1.0).contains(&first.composite_score));
            prop_assert_eq!(&first, &run(&resume, &job, &config));
        }

        #[test]
        fn job_text_fully_matches_itself(job in text(), channel_weights in weights()) {
            let config = ScoringConfig { channel_weights, ..ScoringConfig::default() };
            let report = run(&job, &job, &config);
            if report.channels().iter().any(|c| c.active) {
                prop_assert!((report.composite_score - 1.0).abs() < EPS);
                prop_assert!(report.unmatched.is_empty());
            } else {
                prop_assert_eq!(report.composite_score, 0.0);
            }
        }
    }

    #[test]
    fn test_no_requirements_scores_zero() {
        let config = ScoringConfig::default();
        let report = score(&doc("Python"), &doc(""), &[], &builtin(), &config).unwrap();
        assert_eq!(report.composite_score, 0.0);
        assert!(report.channels().iter().all(|c| !c.active));
    }

    #[test]
    fn test_report_serializes() {
        let report = score(
            &doc("Python"),
            &doc("Python"),
            &[RequirementTerm::normalized("Python")],
            &builtin(),
            &ScoringConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["normalized_overlap"]["channel"], "normalized_overlap");
        assert!(json["composite_score"].is_number());
        assert!(json["weights"]["boolean_satisfaction"].is_number());
    }
}
