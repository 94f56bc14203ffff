//! Résumé drill-down — recruiter-facing detail reported next to the score.
//!
//! Three views, none of which feeds the composite:
//! - knockout checks: hard requirements a job states (location, work
//!   authorization, certification or degree) that the résumé never evidences
//! - section hits: which résumé section each matched requirement was found in
//! - title alignment: word overlap between the job title and the best title
//!   listed under the résumé's experience

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matching::normalization::{normalize_key, Term};
use crate::matching::requirements::RequirementTerm;
use crate::matching::sections::{is_header, ResumeSection, SectionMap, HEADERS, RESUME_HEADERS};
use crate::matching::tokenizer::CanonicalDocument;

/// A job title or a role line on a résumé: capitalized words, `-` and `/` only.
static TITLE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z\s\-/]+$").expect("valid title regex"));

static TITLE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z]+").expect("valid title word regex"));

const MAX_TITLE_WORDS: usize = 8;

// ────────────────────────────────────────────────────────────────────────────
// Knockout checks
// ────────────────────────────────────────────────────────────────────────────

struct KnockoutRule {
    name: &'static str,
    /// Any of these in the job text makes the rule apply.
    job_cues: &'static [&'static str],
    /// Any of these in the résumé text satisfies it.
    evidence: &'static [&'static str],
    failure: &'static str,
}

const KNOCKOUT_RULES: &[KnockoutRule] = &[
    KnockoutRule {
        name: "location",
        job_cues: &["must be located", "location"],
        evidence: &["remote", "location"],
        failure: "Location requirement not found in resume",
    },
    KnockoutRule {
        name: "work_authorization",
        job_cues: &["work authorization", "authorized to work"],
        evidence: &["authorized", "visa"],
        failure: "Work authorization not evidenced",
    },
    KnockoutRule {
        name: "certification",
        job_cues: &["certification", "license", "degree"],
        evidence: &["certification", "degree"],
        failure: "Required certification/degree not evidenced",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockoutCheck {
    pub name: String,
    /// The job text asks for it.
    pub applies: bool,
    /// The résumé text evidences it.
    pub evidenced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnockoutReport {
    pub passed: bool,
    pub failures: Vec<String>,
    pub checks: Vec<KnockoutCheck>,
}

/// Case-insensitive cue matching over the raw texts.
pub fn knockout_checks(job_text: &str, resume_text: &str) -> KnockoutReport {
    let job = normalize_key(job_text);
    let resume = normalize_key(resume_text);
    let mut failures = Vec::new();
    let checks = KNOCKOUT_RULES
        .iter()
        .map(|rule| {
            let applies = rule.job_cues.iter().any(|cue| job.contains(cue));
            let evidenced = rule.evidence.iter().any(|word| resume.contains(word));
            if applies && !evidenced {
                failures.push(rule.failure.to_string());
            }
            KnockoutCheck {
                name: rule.name.to_string(),
                applies,
                evidenced,
            }
        })
        .collect();
    KnockoutReport {
        passed: failures.is_empty(),
        failures,
        checks,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Section hits
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionHits {
    pub section: ResumeSection,
    /// Requirements found in this section, in requirement order.
    pub terms: Vec<Term>,
}

/// Groups the résumé evidence of every requirement by résumé section.
/// Sections without hits are left out.
pub fn section_hits(
    resume_text: &str,
    resume: &CanonicalDocument,
    requirements: &[RequirementTerm],
) -> Vec<SectionHits> {
    let sections = SectionMap::detect_resume(resume_text);
    let mut by_section: BTreeMap<ResumeSection, Vec<Term>> = BTreeMap::new();
    for requirement in requirements {
        for span in resume.find(&requirement.match_key()) {
            let terms = by_section.entry(sections.kind_at(span.start)).or_default();
            if !terms.contains(&requirement.term) {
                terms.push(requirement.term.clone());
            }
        }
    }
    by_section
        .into_iter()
        .map(|(section, terms)| SectionHits { section, terms })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Title alignment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleAlignment {
    pub job_title: Option<String>,
    pub resume_titles: Vec<String>,
    pub best_match: Option<String>,
    /// Share of the job title's words found in the best résumé title, in [0, 1].
    pub score: f64,
}

/// The role part of a line: everything before a date, a comma, `|`, `@` or
/// an opening parenthesis. `None` unless it looks like a title.
fn title_of(line: &str) -> Option<String> {
    let head = line
        .split(|c: char| c.is_ascii_digit() || matches!(c, ',' | '|' | '@' | '(' | '–' | '—'))
        .next()?
        .trim_matches(|c: char| c.is_whitespace() || c == '-');
    let words = head.split_whitespace().count();
    (words > 0 && words <= MAX_TITLE_WORDS && TITLE_LINE.is_match(head))
        .then(|| head.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn title_words(title: &str) -> BTreeSet<String> {
    TITLE_WORD
        .find_iter(&title.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// The job title is the first non-blank line of the job text, if it reads as one.
pub fn job_title(job_text: &str) -> Option<String> {
    let first = job_text.lines().find(|line| !line.trim().is_empty())?;
    if is_header(first, HEADERS) {
        return None;
    }
    title_of(first)
}

/// Role lines under the résumé's experience sections. A résumé without an
/// experience header is searched as a whole.
pub fn resume_titles(resume_text: &str) -> Vec<String> {
    let sections = SectionMap::detect_resume(resume_text);
    let has_experience = sections.contains(ResumeSection::Experience);

    let mut titles = Vec::new();
    let mut offset = 0usize;
    for line in resume_text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if is_header(line, RESUME_HEADERS) {
            continue;
        }
        if has_experience && sections.kind_at(start) != ResumeSection::Experience {
            continue;
        }
        if let Some(title) = title_of(line) {
            if !titles.contains(&title) {
                titles.push(title);
            }
        }
    }
    titles
}

pub fn title_alignment(job_text: &str, resume_text: &str) -> TitleAlignment {
    let job_title = job_title(job_text);
    let resume_titles = resume_titles(resume_text);
    let wanted = job_title.as_deref().map(title_words).unwrap_or_default();

    let mut best_match = None;
    let mut score = 0.0;
    if !wanted.is_empty() {
        for title in &resume_titles {
            let overlap = title_words(title).intersection(&wanted).count();
            let share = overlap as f64 / wanted.len() as f64;
            if share > score {
                score = share;
                best_match = Some(title.clone());
            }
        }
    }

    TitleAlignment {
        job_title,
        resume_titles,
        best_match,
        score,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drilldown {
    pub knockout: KnockoutReport,
    pub section_hits: Vec<SectionHits>,
    pub title_alignment: TitleAlignment,
}

pub fn drilldown(
    resume_text: &str,
    resume: &CanonicalDocument,
    job_text: &str,
    requirements: &[RequirementTerm],
) -> Drilldown {
    Drilldown {
        knockout: knockout_checks(job_text, resume_text),
        section_hits: section_hits(resume_text, resume, requirements),
        title_alignment: title_alignment(job_text, resume_text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::normalization::NormalizationMap;
    use crate::matching::tokenizer::tokenize;

    const JOB: &str = "Project Manager\n\
                       Required: Project management, CRM, Jira\n\
                       Must be authorized to work in the US.\n\
                       Location: Austin, TX\n";

    const RESUME: &str = "Summary\n\
                          Project lead with a PMP certification.\n\
                          Authorized to work in the US.\n\
                          \n\
                          Experience\n\
                          Project Manager, Acme Corp 2019 - 2023\n\
                          Led project management for CRM rollouts tracked in Jira.\n\
                          \n\
                          Skills\n\
                          Jira, Salesforce\n";

    #[test]
    fn test_knockout_checks_follow_job_cues() {
        let report = knockout_checks(JOB, RESUME);
        assert!(!report.passed);
        assert_eq!(report.failures, vec!["Location requirement not found in resume"]);
        let applies: Vec<(&str, bool, bool)> = report
            .checks
            .iter()
            .map(|c| (c.name.as_str(), c.applies, c.evidenced))
            .collect();
        assert_eq!(
            applies,
            vec![
                ("location", true, false),
                ("work_authorization", true, true),
                ("certification", false, true),
            ]
        );

        let remote = knockout_checks(JOB, &format!("{RESUME}Open to remote work.\n"));
        assert!(remote.passed);
        assert!(knockout_checks("Rust engineer", "").passed);
    }

    #[test]
    fn test_section_hits_group_by_resume_section() {
        let map = NormalizationMap::builtin();
        let resume = tokenize(RESUME, &map, 3);
        let requirements = vec![
            RequirementTerm::normalized("Project management"),
            RequirementTerm::normalized("CRM"),
            RequirementTerm::normalized("Jira"),
            RequirementTerm::normalized("Kafka"),
        ];
        let hits = section_hits(RESUME, &resume, &requirements);
        let shape: Vec<(ResumeSection, Vec<&str>)> = hits
            .iter()
            .map(|h| (h.section, h.terms.iter().map(Term::as_str).collect()))
            .collect();
        assert_eq!(
            shape,
            vec![
                (ResumeSection::Summary, vec!["Project management"]),
                (ResumeSection::Experience, vec!["Project management", "CRM", "Jira"]),
                (ResumeSection::Skills, vec!["Jira"]),
            ]
        );
    }

    #[test]
    fn test_title_alignment_uses_experience_titles() {
        let alignment = title_alignment(JOB, RESUME);
        assert_eq!(alignment.job_title.as_deref(), Some("Project Manager"));
        assert_eq!(alignment.resume_titles, vec!["Project Manager".to_string()]);
        assert_eq!(alignment.best_match.as_deref(), Some("Project Manager"));
        assert_eq!(alignment.score, 1.0);
    }

    #[test]
    fn test_title_alignment_partial_and_missing() {
        let resume = "Experience\nSenior Program Manager | Globex\nBuilt dashboards.\n";
        let alignment = title_alignment("Project Manager\nRequired: Jira", resume);
        assert_eq!(alignment.resume_titles, vec!["Senior Program Manager".to_string()]);
        assert!((alignment.score - 0.5).abs() < 1e-12);

        let prose = title_alignment("We need Python and experience with distributed systems.", resume);
        assert_eq!(prose.job_title, None);
        assert_eq!(prose.score, 0.0);
        assert_eq!(prose.best_match, None);

        assert_eq!(title_alignment("Project Manager", "").score, 0.0);
    }

    #[test]
    fn test_titles_without_experience_header() {
        let titles = resume_titles("Jane Doe\nData Engineer, Initech 2020\nPython and SQL pipelines.\n");
        assert_eq!(titles, vec!["Jane Doe".to_string(), "Data Engineer".to_string()]);
    }
}
