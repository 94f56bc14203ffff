//! Section detection — tells which header a byte offset of a job description
//! ("Required", "Preferred", ...) or of a résumé ("Experience", "Skills", ...)
//! sits under.
//!
//! A header is a line whose leading words name the section, either on their own
//! (`Preferred Qualifications`) or before a colon (`Required: Python, Jira`).
//! A section runs until the next header.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    #[default]
    General,
    Required,
    Preferred,
}

/// Job description headers.
pub const HEADERS: &[(&str, SectionKind)] = &[
    ("required", SectionKind::Required),
    ("requirements", SectionKind::Required),
    ("must have", SectionKind::Required),
    ("must-have", SectionKind::Required),
    ("qualifications", SectionKind::Required),
    ("minimum qualifications", SectionKind::Required),
    ("basic qualifications", SectionKind::Required),
    ("preferred", SectionKind::Preferred),
    ("preferred qualifications", SectionKind::Preferred),
    ("nice to have", SectionKind::Preferred),
    ("nice-to-have", SectionKind::Preferred),
    ("bonus", SectionKind::Preferred),
    ("bonus points", SectionKind::Preferred),
    ("about", SectionKind::General),
    ("about us", SectionKind::General),
    ("responsibilities", SectionKind::General),
    ("benefits", SectionKind::General),
    ("what you'll do", SectionKind::General),
    ("summary", SectionKind::General),
];

/// Résumé sections. Text before the first header, or under an unknown one,
/// is `Other`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSection {
    Summary,
    Experience,
    Projects,
    Skills,
    Education,
    Certifications,
    #[default]
    Other,
}

pub const RESUME_HEADERS: &[(&str, ResumeSection)] = &[
    ("summary", ResumeSection::Summary),
    ("profile", ResumeSection::Summary),
    ("professional summary", ResumeSection::Summary),
    ("experience", ResumeSection::Experience),
    ("work experience", ResumeSection::Experience),
    ("professional experience", ResumeSection::Experience),
    ("employment", ResumeSection::Experience),
    ("work history", ResumeSection::Experience),
    ("projects", ResumeSection::Projects),
    ("project experience", ResumeSection::Projects),
    ("skills", ResumeSection::Skills),
    ("core skills", ResumeSection::Skills),
    ("technical skills", ResumeSection::Skills),
    ("competencies", ResumeSection::Skills),
    ("education", ResumeSection::Education),
    ("certifications", ResumeSection::Certifications),
    ("certificates", ResumeSection::Certifications),
    ("licenses", ResumeSection::Certifications),
];

/// Header words allowed after the section keyword ("Required skills").
const MAX_HEADER_WORDS: usize = 4;

/// Section boundaries of one text, as (start byte, kind) sorted by start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap<K = SectionKind> {
    starts: Vec<(usize, K)>,
}

impl SectionMap<SectionKind> {
    /// Job description sections.
    pub fn detect(text: &str) -> Self {
        Self::detect_with(text, HEADERS)
    }
}

impl SectionMap<ResumeSection> {
    pub fn detect_resume(text: &str) -> Self {
        Self::detect_with(text, RESUME_HEADERS)
    }
}

impl<K: Copy + Default> SectionMap<K> {
    pub fn detect_with(text: &str, headers: &[(&str, K)]) -> Self {
        let mut starts = Vec::new();
        let mut offset = 0usize;
        for line in text.split_inclusive('\n') {
            if let Some(kind) = header_kind(line, headers) {
                starts.push((offset, kind));
            }
            offset += line.len();
        }
        Self { starts }
    }

    /// Section that contains `offset`. Text before the first header gets `K::default()`.
    pub fn kind_at(&self, offset: usize) -> K {
        let idx = self.starts.partition_point(|(start, _)| *start <= offset);
        match idx {
            0 => K::default(),
            n => self.starts[n - 1].1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// True when some header of the text opens a `kind` section.
    pub fn contains(&self, kind: K) -> bool
    where
        K: PartialEq,
    {
        self.starts.iter().any(|(_, k)| *k == kind)
    }
}

/// True when `line` is a header of any section in `headers`.
pub fn is_header<K: Copy>(line: &str, headers: &[(&str, K)]) -> bool {
    header_kind(line, headers).is_some()
}

fn header_kind<K: Copy>(line: &str, headers: &[(&str, K)]) -> Option<K> {
    let trimmed = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '#' | '•') || c.is_whitespace());
    let (head, has_colon) = match trimmed.split_once(':') {
        Some((head, _)) => (head, true),
        None => (trimmed, false),
    };
    let head = head.trim().to_lowercase();
    if head.is_empty() || head.split_whitespace().count() > MAX_HEADER_WORDS {
        return None;
    }
    // Without a colon the whole line has to be the header.
    if !has_colon && trimmed.len() != head.len() {
        return None;
    }

    headers
        .iter()
        .filter(|(phrase, _)| {
            head == *phrase
                || head
                    .strip_prefix(phrase)
                    .is_some_and(|rest| rest.starts_with(' '))
        })
        .max_by_key(|(phrase, _)| phrase.len())
        .map(|(_, kind)| *kind)
}
