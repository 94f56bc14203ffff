//! Self-check — runs the whole pipeline over embedded fixtures with the
//! built-in map and default config, and verifies scoring invariants.
//! Touches neither the network nor the filesystem.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::matching::normalization::NormalizationMap;
use crate::matching::pipeline::{MatchOutcome, Snapshot};
use crate::matching::scoring::ScoringConfig;

struct Fixture {
    name: &'static str,
    resume: &'static str,
    job: &'static str,
    expected_min: f64,
    expected_max: f64,
}

const BACKEND_JOB: &str =
    "Requirements: Python, Kubernetes, Docker\nExperience with distributed systems.";

const FIXTURES: &[Fixture] = &[
    Fixture {
        name: "full_match",
        resume: "Senior Python engineer building distributed systems with Kubernetes and Docker.",
        job: BACKEND_JOB,
        expected_min: 1.0,
        expected_max: 1.0,
    },
    Fixture {
        name: "no_match",
        resume: "Pastry chef specializing in sourdough, laminated doughs and wedding cakes.",
        job: BACKEND_JOB,
        expected_min: 0.0,
        expected_max: 0.0,
    },
    Fixture {
        name: "project_manager",
        resume: "Project manager with 6 years of project management experience.\n\
                 Daily user of Jira and Salesforce; built customer relationship management workflows.",
        job: "Project Manager\nRequired: Project management, CRM, Jira\nPreferred: Change management\n",
        expected_min: 0.5,
        expected_max: 0.7,
    },
    Fixture {
        name: "python_distributed_systems",
        resume: "Experienced Python engineer skilled in distributed systems design",
        job: "We need Python and experience with distributed systems.",
        expected_min: 0.99,
        expected_max: 1.0,
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvariantCheck {
    pub name: String,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckCase {
    pub name: String,
    pub expected_min: f64,
    pub expected_max: f64,
    pub observed: Option<f64>,
    pub checks: Vec<InvariantCheck>,
    pub error: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfCheckReport {
    pub passed: bool,
    pub cases: Vec<SelfCheckCase>,
}

pub fn self_check() -> SelfCheckReport {
    let snapshot = Snapshot {
        map: NormalizationMap::builtin().into(),
        config: ScoringConfig::default().into(),
    };
    let cases: Vec<SelfCheckCase> = FIXTURES.iter().map(|f| run_case(&snapshot, f)).collect();
    let passed = cases.iter().all(|c| c.passed);
    info!(passed, cases = cases.len(), "Self-check finished");
    SelfCheckReport { passed, cases }
}

fn run_case(snapshot: &Snapshot, fixture: &Fixture) -> SelfCheckCase {
    let mut case = SelfCheckCase {
        name: fixture.name.to_string(),
        expected_min: fixture.expected_min,
        expected_max: fixture.expected_max,
        observed: None,
        checks: Vec::new(),
        error: None,
        passed: false,
    };

    let outcome = match snapshot.match_texts(fixture.resume, fixture.job) {
        Ok(outcome) => outcome,
        Err(e) => {
            case.error = Some(e.to_string());
            return case;
        }
    };
    let composite = outcome.report.composite_score;
    case.observed = Some(composite);

    let repeat = snapshot.match_texts(fixture.resume, fixture.job).ok();
    let mut check = |name: &str, passed: bool| {
        case.checks.push(InvariantCheck {
            name: name.to_string(),
            passed,
        })
    };
    check("determinism", repeat.as_ref() == Some(&outcome));
    check("bounds", scores_bounded(&outcome));
    check("idempotence", idempotent(snapshot, fixture));
    check("provenance", provenance_holds(snapshot, fixture, &outcome));

    let in_range = composite >= fixture.expected_min - 1e-9 && composite <= fixture.expected_max + 1e-9;
    case.passed = in_range && case.checks.iter().all(|c| c.passed);
    case
}

fn scores_bounded(outcome: &MatchOutcome) -> bool {
    let unit = |x: f64| (0.0..=1.0).contains(&x);
    unit(outcome.report.composite_score) && outcome.report.channels().iter().all(|c| unit(c.score))
}

/// Canonicalizing any canonical token again changes nothing.
fn idempotent(snapshot: &Snapshot, fixture: &Fixture) -> bool {
    [fixture.resume, fixture.job].iter().all(|text| {
        snapshot.tokenize(text).tokens().iter().all(|token| {
            let once = snapshot.map.canonicalize(token.term.as_str());
            once == token.term && snapshot.map.canonicalize(once.as_str()) == once
        })
    })
}

/// Every contributing term is a requirement or appears in the résumé.
fn provenance_holds(snapshot: &Snapshot, fixture: &Fixture, outcome: &MatchOutcome) -> bool {
    let resume = snapshot.tokenize(fixture.resume);
    let resume_keys = resume.term_keys();
    outcome.report.channels().iter().all(|channel| {
        channel.contributions.iter().all(|c| {
            outcome.requirements.iter().any(|r| r.term == c.term)
                || resume_keys.contains(c.term.key().as_str())
        })
    })
}
