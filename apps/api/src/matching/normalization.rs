//! Normalization Map — canonicalizes surface variants ("py", "Python3") to one Term.
//!
//! Lookups are case- and whitespace-insensitive. The map is a plain value:
//! callers that share it across threads hold it behind an `Arc` snapshot
//! (see `matching::pipeline::Session`), so edits never leak into an
//! in-flight scoring call.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::errors::ScoringError;

/// Built-in variant table used when no map file is configured and by the self-check.
const BUILTIN_SYNONYMS: &[(&str, &[&str])] = &[
    ("Python", &["py", "python3", "python 3"]),
    ("JavaScript", &["js", "ecmascript", "java script"]),
    ("TypeScript", &["ts"]),
    ("Kubernetes", &["k8s", "kube"]),
    ("PostgreSQL", &["postgres", "psql"]),
    ("Amazon Web Services", &["aws", "amazon aws"]),
    ("Google Cloud Platform", &["gcp", "google cloud"]),
    ("CI/CD", &["continuous integration", "ci-cd", "cicd"]),
    ("CRM", &["customer relationship management"]),
    ("Project management", &["project mgmt", "pmp"]),
    ("Machine learning", &["ml"]),
    ("Jira", &[]),
    ("Salesforce", &["sfdc"]),
    ("SQL", &[]),
    ("Docker", &[]),
    ("React", &["reactjs", "react.js"]),
    ("Node.js", &["nodejs", "node js"]),
    ("Rust", &[]),
    ("Java", &[]),
];

/// Comparison key for a phrase: NFKC-folded, lowercased, whitespace collapsed.
pub fn normalize_key(text: &str) -> String {
    let folded: String = text.nfkc().collect::<String>().to_lowercase().nfkc().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A canonical label. Display casing is preserved; equality of concepts goes through `key()`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Term(String);

impl Term {
    /// Builds a term from free text, trimming and collapsing inner whitespace.
    pub fn new(label: &str) -> Self {
        Term(label.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key(&self) -> String {
        normalize_key(&self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Term {
    fn from(label: &str) -> Self {
        Term::new(label)
    }
}

/// On-disk shape of the map: `{"synonyms": {"py": "Python"}, "terms": ["Rust"]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizationFile {
    #[serde(default)]
    pub synonyms: BTreeMap<String, String>,
    #[serde(default)]
    pub terms: Vec<String>,
}

/// Variant → canonical Term table.
///
/// Invariants kept by every mutation:
/// - a canonical term's key is never also a variant key (canonicalization stays idempotent)
/// - every variant points at a registered canonical term
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NormalizationFile", into = "NormalizationFile")]
pub struct NormalizationMap {
    /// canonical key → display term
    terms: BTreeMap<String, Term>,
    /// variant key → canonical key
    variants: BTreeMap<String, String>,
}

impl NormalizationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded synonym table.
    pub fn builtin() -> Self {
        let mut map = Self::new();
        for (term, variants) in BUILTIN_SYNONYMS {
            map.terms.insert(normalize_key(term), Term::new(term));
            for variant in *variants {
                map.variants.insert(normalize_key(variant), normalize_key(term));
            }
        }
        map
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Canonical terms in key order.
    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.values()
    }

    /// Finds the canonical term for an already-normalized key.
    pub fn lookup_key(&self, key: &str) -> Option<&Term> {
        match self.variants.get(key) {
            Some(canonical) => self.terms.get(canonical),
            None => self.terms.get(key),
        }
    }

    /// True when the phrase is a known variant or canonical term.
    pub fn contains(&self, phrase: &str) -> bool {
        self.lookup_key(&normalize_key(phrase)).is_some()
    }

    /// Rewrites a phrase to its canonical term, or returns it lightly normalized
    /// (trimmed, whitespace collapsed, casing kept) when unmapped.
    pub fn canonicalize(&self, phrase: &str) -> Term {
        self.lookup_key(&normalize_key(phrase))
            .cloned()
            .unwrap_or_else(|| Term::new(phrase))
    }

    /// Key of the concept a phrase belongs to. Used to cluster requirement terms.
    pub fn cluster_key(&self, phrase: &str) -> String {
        let key = normalize_key(phrase);
        match self.lookup_key(&key) {
            Some(term) => term.key(),
            None => key,
        }
    }

    /// Registers a self-canonical term (a term with no variants yet).
    pub fn add_term(&mut self, term: &str) -> Result<Term, ScoringError> {
        let key = normalize_key(term);
        if key.is_empty() {
            return Err(ScoringError::mapping("term must not be empty"));
        }
        if let Some(owner) = self.variants.get(&key) {
            return Err(ScoringError::mapping(format!(
                "'{}' is already a variant of '{}'",
                term.trim(),
                self.terms.get(owner).map(Term::as_str).unwrap_or(owner.as_str())
            )));
        }
        Ok(self
            .terms
            .entry(key)
            .or_insert_with(|| Term::new(term))
            .clone())
    }

    /// Maps `variant` to `term`. Re-pointing an existing variant needs `override_existing`.
    /// On error the map is unchanged.
    pub fn add_variant(
        &mut self,
        variant: &str,
        term: &str,
        override_existing: bool,
    ) -> Result<Term, ScoringError> {
        let variant_key = normalize_key(variant);
        let term_key = normalize_key(term);
        if variant_key.is_empty() {
            return Err(ScoringError::mapping("variant must not be empty"));
        }
        if term_key.is_empty() {
            return Err(ScoringError::mapping("term must not be empty"));
        }
        if variant_key == term_key {
            return self.add_term(term);
        }
        if let Some(owner) = self.variants.get(&term_key) {
            return Err(ScoringError::mapping(format!(
                "'{}' is a variant of '{}', map to the canonical term instead",
                term.trim(),
                self.terms.get(owner).map(Term::as_str).unwrap_or(owner.as_str())
            )));
        }
        if self.terms.contains_key(&variant_key) {
            return Err(ScoringError::mapping(format!(
                "'{}' is itself a canonical term",
                variant.trim()
            )));
        }
        if let Some(existing) = self.variants.get(&variant_key) {
            if *existing == term_key {
                return Ok(self.terms[&term_key].clone());
            }
            if !override_existing {
                return Err(ScoringError::mapping(format!(
                    "'{}' already maps to '{}' (set override to replace it)",
                    variant.trim(),
                    self.terms.get(existing).map(Term::as_str).unwrap_or(existing.as_str())
                )));
            }
        }

        let canonical = self
            .terms
            .entry(term_key.clone())
            .or_insert_with(|| Term::new(term))
            .clone();
        self.variants.insert(variant_key, term_key);
        Ok(canonical)
    }

    /// Drops a variant. The canonical term it pointed at stays registered.
    pub fn remove_variant(&mut self, variant: &str) -> Result<Term, ScoringError> {
        let key = normalize_key(variant);
        if key.is_empty() {
            return Err(ScoringError::mapping("variant must not be empty"));
        }
        let canonical = self
            .variants
            .remove(&key)
            .ok_or_else(|| ScoringError::mapping(format!("'{}' is not a known variant", variant.trim())))?;
        Ok(self.terms[&canonical].clone())
    }

    /// Canonical terms with their variant keys, in key order.
    pub fn variant_groups(&self) -> Vec<(Term, Vec<String>)> {
        let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (variant, canonical) in &self.variants {
            groups.entry(canonical.as_str()).or_default().push(variant.clone());
        }
        self.terms
            .iter()
            .map(|(key, term)| {
                (
                    term.clone(),
                    groups.remove(key.as_str()).unwrap_or_default(),
                )
            })
            .collect()
    }
}

impl TryFrom<NormalizationFile> for NormalizationMap {
    type Error = ScoringError;

    fn try_from(file: NormalizationFile) -> Result<Self, Self::Error> {
        let mut map = NormalizationMap::new();
        for term in &file.terms {
            map.add_term(term)?;
        }
        for term in file.synonyms.values() {
            if map.lookup_key(&normalize_key(term)).is_none() {
                map.add_term(term)?;
            }
        }
        for (variant, term) in &file.synonyms {
            map.add_variant(variant, term, false)?;
        }
        Ok(map)
    }
}

impl From<NormalizationMap> for NormalizationFile {
    fn from(map: NormalizationMap) -> Self {
        let synonyms = map
            .variants
            .iter()
            .map(|(variant, canonical)| (variant.clone(), map.terms[canonical].to_string()))
            .collect();
        let terms = map.terms.values().map(Term::to_string).collect();
        NormalizationFile { synonyms, terms }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn py_map() -> NormalizationMap {
        let mut map = NormalizationMap::new();
        map.add_variant("py", "Python", false).unwrap();
        map
    }

    #[test]
    fn test_normalize_key_folds_case_and_whitespace() {
        assert_eq!(normalize_key("  Machine \t Learning "), "machine learning");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn test_canonicalize_variant_to_term() {
        let map = py_map();
        assert_eq!(map.canonicalize("PY").as_str(), "Python");
        assert_eq!(map.canonicalize(" python ").as_str(), "Python");
    }

    #[test]
    fn test_canonicalize_unknown_keeps_casing() {
        let map = py_map();
        assert_eq!(map.canonicalize("  Distributed   Systems ").as_str(), "Distributed Systems");
    }

    fn variant_phrase() -> impl Strategy<Value = String> {
        let known: Vec<&'static str> = BUILTIN_SYNONYMS
            .iter()
            .flat_map(|(term, variants)| std::iter::once(*term).chain(variants.iter().copied()))
            .collect();
        (prop::sample::select(known), "[ \t]{0,3}", any::<bool>()).prop_map(
            |(phrase, pad, upper)| {
                let phrase = if upper { phrase.to_uppercase() } else { phrase.to_string() };
                format!("{pad}{phrase}{pad}")
            },
        )
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(input in ".{0,64}") {
            let map = NormalizationMap::builtin();
            let once = map.canonicalize(&input);
            prop_assert_eq!(map.canonicalize(once.as_str()), once);
        }

        #[test]
        fn canonicalize_is_idempotent_on_known_variants(input in variant_phrase()) {
            let map = NormalizationMap::builtin();
            let once = map.canonicalize(&input);
            prop_assert!(map.terms().any(|t| *t == once));
            prop_assert_eq!(map.canonicalize(once.as_str()), once);
        }
    }

    #[test]
    fn test_add_variant_rejects_empty_term() {
        let mut map = NormalizationMap::new();
        let err = map.add_variant("py", "  ", false).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidMapping(_)));
        assert!(map.is_empty());
    }

    #[test]
    fn test_add_variant_conflict_requires_override() {
        let mut map = py_map();
        let err = map.add_variant("py", "PyTorch", false).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidMapping(_)));
        assert_eq!(map.canonicalize("py").as_str(), "Python");

        map.add_variant("py", "PyTorch", true).unwrap();
        assert_eq!(map.canonicalize("py").as_str(), "PyTorch");
    }

    #[test]
    fn test_add_variant_same_mapping_is_noop() {
        let mut map = py_map();
        let before = map.clone();
        assert_eq!(map.add_variant("Py", "python", false).unwrap().as_str(), "Python");
        assert_eq!(map, before);
    }

    #[test]
    fn test_add_variant_rejects_chains() {
        let mut map = py_map();
        // target is a variant
        assert!(map.add_variant("python three", "py", false).is_err());
        // variant is a canonical term
        assert!(map.add_variant("python", "Snake", true).is_err());
        assert_eq!(map.canonicalize("python").as_str(), "Python");
    }

    #[test]
    fn test_remove_variant() {
        let mut map = py_map();
        assert_eq!(map.remove_variant("PY").unwrap().as_str(), "Python");
        assert_eq!(map.canonicalize("py").as_str(), "py");
        // canonical term survives as self-canonical
        assert_eq!(map.canonicalize("PYTHON").as_str(), "Python");
        assert!(map.remove_variant("py").is_err());
    }

    #[test]
    fn test_add_term_rejects_existing_variant() {
        let mut map = py_map();
        assert!(map.add_term("py").is_err());
        assert_eq!(map.add_term("rust").unwrap().as_str(), "rust");
        assert_eq!(map.add_term("RUST").unwrap().as_str(), "rust");
    }

    #[test]
    fn test_variant_groups() {
        let mut map = py_map();
        map.add_variant("python3", "Python", false).unwrap();
        map.add_term("Rust").unwrap();
        let groups = map.variant_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_str(), "Python");
        assert_eq!(groups[0].1, vec!["py".to_string(), "python3".to_string()]);
        assert!(groups[1].1.is_empty());
    }

    #[test]
    fn test_cluster_key_follows_variants() {
        let map = py_map();
        assert_eq!(map.cluster_key("Py"), "python");
        assert_eq!(map.cluster_key("Kafka"), "kafka");
    }

    #[test]
    fn test_json_round_trip_original_format() {
        let json = r#"{"synonyms": {"crm": "CRM", "customer relationship management": "CRM", "py": "Python"}}"#;
        let map: NormalizationMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.canonicalize("Customer Relationship Management").as_str(), "CRM");
        assert_eq!(map.canonicalize("crm").as_str(), "CRM");

        let back: NormalizationMap =
            serde_json::from_str(&serde_json::to_string(&map).unwrap()).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_json_rejects_chained_synonyms() {
        let json = r#"{"synonyms": {"a": "b", "b": "c"}}"#;
        assert!(serde_json::from_str::<NormalizationMap>(json).is_err());
    }
}
