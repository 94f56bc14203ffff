//! Match pipeline and shared session state.
//!
//! `Session` owns the live Normalization Map and Scoring Config as `Arc`
//! snapshots. Edits clone, mutate and swap the `Arc`, so a call that already
//! took a [`Snapshot`] finishes against exactly the data it started with.
//! When the session has a map file, an edit is written there before it goes
//! live, and a failed write leaves the live map as it was.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::save_normalization_map;
use crate::errors::{AppError, ScoringError};
use crate::matching::boolean::{
    build_query, parse_query, search_resumes, BooleanQuery, ResumeText, SearchHit,
};
use crate::matching::drilldown::{drilldown, Drilldown};
use crate::matching::normalization::{NormalizationMap, Term};
use crate::matching::requirements::{extract_requirements, RequirementTerm};
use crate::matching::scoring::{score_query, ScoreReport, ScoringConfig};
use crate::matching::tokenizer::{tokenize, CanonicalDocument};

pub struct Session {
    map: RwLock<Arc<NormalizationMap>>,
    config: RwLock<Arc<ScoringConfig>>,
    map_file: Option<PathBuf>,
    /// Serializes map edits, including their file write.
    edits: Mutex<()>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            map: RwLock::new(Arc::new(NormalizationMap::builtin())),
            config: RwLock::new(Arc::new(ScoringConfig::default())),
            map_file: None,
            edits: Mutex::new(()),
        }
    }
}

impl Session {
    pub fn new(map: NormalizationMap, config: ScoringConfig) -> Result<Self, ScoringError> {
        config.validate()?;
        Ok(Self {
            map: RwLock::new(Arc::new(map)),
            config: RwLock::new(Arc::new(config)),
            ..Self::default()
        })
    }

    /// Persists every map edit to `path`.
    pub fn with_map_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.map_file = Some(path.into());
        self
    }

    /// Consistent view of map and config for one call.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            map: self.map(),
            config: self.config(),
        }
    }

    pub fn map(&self) -> Arc<NormalizationMap> {
        Arc::clone(&self.map.read())
    }

    pub fn config(&self) -> Arc<ScoringConfig> {
        Arc::clone(&self.config.read())
    }

    pub fn add_term(&self, term: &str) -> Result<Term, AppError> {
        let added = self.edit_map(|map| map.add_term(term))?;
        info!(term = %added, "Added canonical term");
        Ok(added)
    }

    pub fn add_variant(
        &self,
        variant: &str,
        term: &str,
        override_existing: bool,
    ) -> Result<Term, AppError> {
        let target = self.edit_map(|map| map.add_variant(variant, term, override_existing))?;
        info!(variant, term = %target, "Mapped variant");
        Ok(target)
    }

    pub fn remove_variant(&self, variant: &str) -> Result<Term, AppError> {
        let previous = self.edit_map(|map| map.remove_variant(variant))?;
        info!(variant, term = %previous, "Removed variant");
        Ok(previous)
    }

    /// Replaces the scoring config. An invalid config leaves the current one in place.
    pub fn set_config(&self, config: ScoringConfig) -> Result<(), ScoringError> {
        config.validate()?;
        *self.config.write() = Arc::new(config);
        info!("Scoring config replaced");
        Ok(())
    }

    /// Copy-on-write edit. The live map is swapped only when `edit` succeeds
    /// and, with a map file, only once the edited map is on disk. Readers keep
    /// the previous snapshot until then.
    fn edit_map<T>(
        &self,
        edit: impl FnOnce(&mut NormalizationMap) -> Result<T, ScoringError>,
    ) -> Result<T, AppError> {
        let _edit = self.edits.lock();
        let mut next = NormalizationMap::clone(&self.map());
        let out = edit(&mut next)?;
        if let Some(path) = &self.map_file {
            save_normalization_map(path, &next)?;
        }
        *self.map.write() = Arc::new(next);
        Ok(out)
    }
}

/// Job description offered for ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobText {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub requirements: Vec<RequirementTerm>,
    /// Recruiter-syntax rendering of `query_tree`.
    pub query: String,
    pub query_tree: BooleanQuery,
    pub report: ScoreReport,
    /// Knockout checks, section hits and title alignment. Not part of the composite.
    pub drilldown: Drilldown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedJob {
    pub id: String,
    pub title: String,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub map: Arc<NormalizationMap>,
    pub config: Arc<ScoringConfig>,
}

impl Snapshot {
    pub fn tokenize(&self, text: &str) -> CanonicalDocument {
        tokenize(text, &self.map, self.config.max_ngram_length)
    }

    /// Tokenize, extract requirements, build the query, score.
    pub fn match_texts(&self, resume: &str, job: &str) -> Result<MatchOutcome, ScoringError> {
        self.config.validate()?;
        let resume_doc = self.tokenize(resume);
        let job_doc = self.tokenize(job);
        self.match_documents(resume, &resume_doc, job, &job_doc)
    }

    fn match_documents(
        &self,
        resume_text: &str,
        resume: &CanonicalDocument,
        job_text: &str,
        job: &CanonicalDocument,
    ) -> Result<MatchOutcome, ScoringError> {
        let requirements = extract_requirements(job_text, job, &self.config);
        let query = build_query(&requirements, &self.config.exclusions(&self.map));
        let report = score_query(resume, job, &requirements, &query, &self.config)?;
        let drilldown = drilldown(resume_text, resume, job_text, &requirements);
        Ok(MatchOutcome {
            requirements,
            query: query.to_string(),
            query_tree: query,
            report,
            drilldown,
        })
    }

    /// Scores one résumé against many jobs, best first. Ties keep input order.
    pub fn rank_jobs(
        &self,
        resume: &str,
        jobs: &[JobText],
    ) -> Result<Vec<RankedJob>, ScoringError> {
        self.config.validate()?;
        let resume_doc = self.tokenize(resume);
        let mut ranked = jobs
            .iter()
            .map(|job| -> Result<RankedJob, ScoringError> {
                let job_doc = self.tokenize(&job.text);
                Ok(RankedJob {
                    id: job.id.clone(),
                    title: job.title.clone(),
                    outcome: self.match_documents(resume, &resume_doc, &job.text, &job_doc)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        ranked.sort_by(|a, b| {
            b.outcome
                .report
                .composite_score
                .total_cmp(&a.outcome.report.composite_score)
        });
        info!(jobs = ranked.len(), "Ranked jobs");
        Ok(ranked)
    }

    /// Parses a recruiter query and runs it over `resumes`.
    pub fn search(
        &self,
        query: &str,
        resumes: &[ResumeText],
    ) -> Result<(BooleanQuery, Vec<SearchHit>), ScoringError> {
        let parsed = parse_query(query, &self.map)?;
        let hits = search_resumes(&parsed, resumes, &self.map, self.config.max_ngram_length);
        info!(query = %parsed, hits = hits.len(), "Searched résumés");
        Ok((parsed, hits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_normalization_map;

    const JOB: &str = "We need Python and experience with distributed systems.";

    #[test]
    fn test_match_texts_end_to_end() {
        let session = Session::default();
        let outcome = session
            .snapshot()
            .match_texts("Experienced Python engineer skilled in distributed systems design", JOB)
            .unwrap();
        let terms: Vec<&str> = outcome.requirements.iter().map(|r| r.term.as_str()).collect();
        assert_eq!(terms, vec!["Python", "distributed systems"]);
        assert_eq!(outcome.query, "Python AND \"distributed systems\"");
        assert!((outcome.report.composite_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_survives_edits() {
        let session = Session::new(NormalizationMap::new(), ScoringConfig::default()).unwrap();
        session.add_term("Python").unwrap();
        let before = session.snapshot();

        session.add_variant("py", "Python", false).unwrap();
        let after = session.snapshot();

        let resume = "py scripting";
        let job = "Python developer";
        let old = before.match_texts(resume, job).unwrap();
        let new = after.match_texts(resume, job).unwrap();
        assert_eq!(old.report.normalized_overlap.score, 0.0);
        assert_eq!(new.report.normalized_overlap.score, 1.0);
        assert!(!before.map.contains("py"));
    }

    #[test]
    fn test_failed_edit_leaves_map_unchanged() {
        let session = Session::default();
        let before = session.map();
        let err = session.add_variant("py", "JavaScript", false).unwrap_err();
        assert!(matches!(err, AppError::Scoring(ScoringError::InvalidMapping(_))));
        assert!(Arc::ptr_eq(&before, &session.map()));
        assert!(session.remove_variant("no-such-variant").is_err());
        assert_eq!(session.map().canonicalize("py").as_str(), "Python");
    }

    #[test]
    fn test_set_config_validates() {
        let session = Session::default();
        let mut bad = ScoringConfig::default();
        bad.max_ngram_length = 0;
        assert!(session.set_config(bad).is_err());
        assert_eq!(session.config().max_ngram_length, 3);

        let mut good = ScoringConfig::default();
        good.max_open_vocab_terms = 2;
        session.set_config(good).unwrap();
        assert_eq!(session.config().max_open_vocab_terms, 2);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = ScoringConfig::default();
        config.channel_weights.normalized_overlap = 2.0;
        assert!(Session::new(NormalizationMap::builtin(), config).is_err());
    }

    #[test]
    fn test_rank_jobs_orders_by_composite() {
        let session = Session::default();
        let jobs = vec![
            JobText {
                id: "baker".into(),
                title: "Baker".into(),
                text: "Required: sourdough baking, pastry lamination".into(),
            },
            JobText {
                id: "backend".into(),
                title: "Backend".into(),
                text: JOB.into(),
            },
            JobText {
                id: "empty".into(),
                title: String::new(),
                text: String::new(),
            },
        ];
        let ranked = session
            .snapshot()
            .rank_jobs("Python engineer building distributed systems", &jobs)
            .unwrap();
        let ids: Vec<&str> = ranked.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["backend", "baker", "empty"]);
    }

    #[test]
    fn test_exclusions_are_canonicalized() {
        let mut config = ScoringConfig::default();
        config.excluded_terms = vec!["k8s".into()];
        let session = Session::new(NormalizationMap::builtin(), config).unwrap();
        let outcome = session
            .snapshot()
            .match_texts("Python and Kubernetes", "Required: Python")
            .unwrap();
        assert_eq!(outcome.query, "Python AND NOT Kubernetes");
        assert!(outcome.report.exclusions[0].present);
    }

    #[test]
    fn test_search_through_snapshot() {
        let session = Session::default();
        let resumes = vec![ResumeText {
            id: "a".into(),
            name: "a.txt".into(),
            text: "py and aws".into(),
        }];
        let (query, hits) = session
            .snapshot()
            .search("python AND \"amazon web services\"", &resumes)
            .unwrap();
        assert_eq!(query.to_string(), "Python AND \"Amazon Web Services\"");
        assert_eq!(hits.len(), 1);
        assert!(session.snapshot().search("python AND", &resumes).is_err());
    }

    #[test]
    fn test_edits_are_written_to_the_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.json");
        let session = Session::default().with_map_file(&path);
        session.add_variant("golang", "Go", false).unwrap();
        let saved = load_normalization_map(Some(&path)).unwrap();
        assert_eq!(saved.canonicalize("golang").as_str(), "Go");
        assert_eq!(saved, *session.map());
    }

    #[test]
    fn test_failed_save_rolls_back_the_edit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("synonyms.json");
        let session = Session::default().with_map_file(&path);
        let before = session.map();

        let err = session.add_variant("golang", "Go", false).unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(Arc::ptr_eq(&before, &session.map()));
        assert_eq!(session.map().canonicalize("golang").as_str(), "golang");
    }

    #[test]
    fn test_concurrent_edits_all_land_in_memory_and_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synonyms.json");
        let session = Session::default().with_map_file(&path);
        std::thread::scope(|scope| {
            for i in 0..8 {
                let session = &session;
                scope.spawn(move || {
                    session.add_variant(&format!("alias{i}"), "Rust", false).unwrap();
                });
            }
        });
        let saved = load_normalization_map(Some(&path)).unwrap();
        for i in 0..8 {
            let variant = format!("alias{i}");
            assert_eq!(session.map().canonicalize(&variant).as_str(), "Rust");
            assert_eq!(saved.canonicalize(&variant).as_str(), "Rust");
        }
    }

    #[test]
    fn test_match_reports_drilldown() {
        let session = Session::default();
        let outcome = session
            .snapshot()
            .match_texts(
                "Experience\nProject Manager, Acme 2020\nRan CRM rollouts.\n",
                "Project Manager\nRequired: CRM\nLocation: Austin, TX\n",
            )
            .unwrap();
        let drilldown = &outcome.drilldown;
        assert_eq!(drilldown.title_alignment.score, 1.0);
        assert!(!drilldown.knockout.passed);
        assert_eq!(drilldown.section_hits.len(), 1);
        assert_eq!(drilldown.section_hits[0].terms, vec![Term::new("CRM")]);
        assert!((outcome.report.composite_score - 1.0).abs() < 1e-9);
    }
}
