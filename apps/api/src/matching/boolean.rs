//! Boolean Search Simulator — recruiter-style AND/OR/NOT queries over a
//! canonical résumé document.
//!
//! Queries built from job requirements are one OR-group per concept cluster,
//! AND-joined, plus a `NOT` child per configured exclusion. NOT is never
//! inferred from job prose. Queries typed by a user go through [`parse_query`].

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ScoringError;
use crate::matching::normalization::{normalize_key, NormalizationMap, Term};
use crate::matching::requirements::RequirementTerm;
use crate::matching::tokenizer::{tokenize, CanonicalDocument, Span};

/// Deepest NOT / parenthesis nesting a typed query may use.
pub const MAX_QUERY_DEPTH: usize = 64;
/// Most operators, operands and parentheses a typed query may contain.
pub const MAX_QUERY_LEXEMES: usize = 1024;

static QUERY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\(|\)|"[^"]*"|[^\s()"]+"#).expect("valid query regex"));

/// A term-presence predicate. `key` is what gets looked up in the document.
///
/// Typed operands also carry `word_key`, the operand as the user wrote it, so
/// `cloud` still matches a résumé where it was folded into a longer
/// dictionary phrase such as "Google Cloud Platform".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTerm {
    pub term: Term,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_key: Option<String>,
}

impl QueryTerm {
    pub fn new(term: Term, key: impl Into<String>) -> Self {
        Self {
            term,
            key: key.into(),
            word_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum QueryNode {
    Term(QueryTerm),
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

impl QueryNode {
    fn precedence(&self) -> u8 {
        match self {
            QueryNode::Or(children) if children.len() > 1 => 1,
            QueryNode::And(children) if children.len() > 1 => 2,
            _ => 3,
        }
    }

    fn fmt_child(&self, child: &QueryNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }

    fn fmt_joined(&self, children: &[QueryNode], op: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, " {op} ")?;
            }
            self.fmt_child(child, f)?;
        }
        Ok(())
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term(leaf) if leaf.term.as_str().contains(' ') => {
                write!(f, "\"{}\"", leaf.term)
            }
            QueryNode::Term(leaf) => write!(f, "{}", leaf.term),
            QueryNode::And(children) => self.fmt_joined(children, "AND", f),
            QueryNode::Or(children) => self.fmt_joined(children, "OR", f),
            QueryNode::Not(child) => {
                f.write_str("NOT ")?;
                self.fmt_child(child, f)
            }
        }
    }
}

/// A query tree. No root means the empty query, which every document satisfies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BooleanQuery {
    pub root: Option<QueryNode>,
}

impl BooleanQuery {
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl fmt::Display for BooleanQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.root {
            Some(root) => write!(f, "{root}"),
            None => Ok(()),
        }
    }
}

/// Builds the job's query: OR within a concept cluster, AND across clusters,
/// `NOT` for every exclusion.
pub fn build_query(requirements: &[RequirementTerm], exclusions: &[QueryTerm]) -> BooleanQuery {
    let mut order: Vec<String> = Vec::new();
    let mut clusters: HashMap<String, Vec<QueryTerm>> = HashMap::new();
    for requirement in requirements {
        let cluster = requirement.match_key();
        let leaves = clusters.entry(cluster.clone()).or_insert_with(|| {
            order.push(cluster.clone());
            Vec::new()
        });
        if !leaves.iter().any(|l| l.term == requirement.term) {
            leaves.push(QueryTerm::new(requirement.term.clone(), cluster));
        }
    }

    let mut children: Vec<QueryNode> = order
        .iter()
        .filter_map(|cluster| clusters.remove(cluster))
        .map(|mut leaves| {
            if leaves.len() == 1 {
                QueryNode::Term(leaves.remove(0))
            } else {
                QueryNode::Or(leaves.into_iter().map(QueryNode::Term).collect())
            }
        })
        .collect();
    children.extend(
        exclusions
            .iter()
            .cloned()
            .map(|leaf| QueryNode::Not(Box::new(QueryNode::Term(leaf)))),
    );

    BooleanQuery {
        root: (!children.is_empty()).then_some(QueryNode::And(children)),
    }
}

/// Match state of one leaf, in tree order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafTrace {
    pub term: Term,
    pub key: String,
    pub matched: bool,
    /// Leaf sits under an odd number of NOTs.
    pub negated: bool,
    /// Index of the top-level AND child the leaf belongs to.
    pub group: usize,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub satisfied: bool,
    pub groups_satisfied: usize,
    pub groups_total: usize,
    pub group_results: Vec<bool>,
    pub leaves: Vec<LeafTrace>,
}

impl Evaluation {
    /// 1.0 when satisfied, otherwise the fraction of top-level groups that hold.
    pub fn partial_score(&self) -> f64 {
        if self.satisfied {
            1.0
        } else if self.groups_total == 0 {
            0.0
        } else {
            self.groups_satisfied as f64 / self.groups_total as f64
        }
    }
}

/// Evaluates `query` against a document. With `explain` every child is
/// visited so the trace is complete; without it AND/OR stop as soon as the
/// outcome is known.
pub fn evaluate(query: &BooleanQuery, document: &CanonicalDocument, explain: bool) -> Evaluation {
    let mut leaves = Vec::new();
    let Some(root) = &query.root else {
        return Evaluation {
            satisfied: true,
            groups_satisfied: 0,
            groups_total: 0,
            group_results: Vec::new(),
            leaves,
        };
    };

    let groups: Vec<&QueryNode> = match root {
        QueryNode::And(children) => children.iter().collect(),
        other => vec![other],
    };
    let mut group_results = Vec::with_capacity(groups.len());
    for (group, node) in groups.iter().enumerate() {
        let ok = eval_node(node, document, explain, group, false, &mut leaves);
        group_results.push(ok);
        if !ok && !explain {
            break;
        }
    }

    let groups_satisfied = group_results.iter().filter(|ok| **ok).count();
    Evaluation {
        satisfied: group_results.len() == groups.len() && group_results.iter().all(|ok| *ok),
        groups_satisfied,
        groups_total: groups.len(),
        group_results,
        leaves,
    }
}

fn eval_node(
    node: &QueryNode,
    document: &CanonicalDocument,
    explain: bool,
    group: usize,
    negated: bool,
    leaves: &mut Vec<LeafTrace>,
) -> bool {
    match node {
        QueryNode::Term(leaf) => {
            let mut spans = document.find(&leaf.key);
            if spans.is_empty() {
                if let Some(word_key) = &leaf.word_key {
                    spans = document.find_words(word_key);
                }
            }
            let matched = !spans.is_empty();
            leaves.push(LeafTrace {
                term: leaf.term.clone(),
                key: leaf.key.clone(),
                matched,
                negated,
                group,
                spans,
            });
            matched
        }
        QueryNode::And(children) => {
            let mut all = true;
            for child in children {
                all &= eval_node(child, document, explain, group, negated, leaves);
                if !all && !explain {
                    break;
                }
            }
            all
        }
        QueryNode::Or(children) => {
            let mut any = false;
            for child in children {
                any |= eval_node(child, document, explain, group, negated, leaves);
                if any && !explain {
                    break;
                }
            }
            any
        }
        QueryNode::Not(child) => !eval_node(child, document, explain, group, !negated, leaves),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recruiter query syntax
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    And,
    Or,
    Not,
    Open,
    Close,
    Operand(String),
}

fn lex(query: &str) -> Result<Vec<Lexeme>, ScoringError> {
    if query.matches('"').count() % 2 != 0 {
        return Err(ScoringError::query("unbalanced quote"));
    }
    let mut out = Vec::new();
    for m in QUERY_TOKEN.find_iter(query) {
        if out.len() == MAX_QUERY_LEXEMES {
            return Err(ScoringError::query(format!(
                "query has more than {MAX_QUERY_LEXEMES} operators and operands"
            )));
        }
        let text = m.as_str();
        let lexeme = match text {
            "(" => Lexeme::Open,
            ")" => Lexeme::Close,
            _ if text.starts_with('"') => {
                let phrase = text.trim_matches('"').trim();
                if phrase.is_empty() {
                    return Err(ScoringError::query("empty quoted phrase"));
                }
                Lexeme::Operand(phrase.to_string())
            }
            _ if text.eq_ignore_ascii_case("and") => Lexeme::And,
            _ if text.eq_ignore_ascii_case("or") => Lexeme::Or,
            _ if text.eq_ignore_ascii_case("not") => Lexeme::Not,
            _ => Lexeme::Operand(text.to_string()),
        };
        out.push(lexeme);
    }
    Ok(out)
}

struct Parser<'a> {
    lexemes: Vec<Lexeme>,
    pos: usize,
    depth: usize,
    map: &'a NormalizationMap,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let lexeme = self.lexemes.get(self.pos).cloned();
        self.pos += 1;
        lexeme
    }

    fn descend(&mut self) -> Result<(), ScoringError> {
        self.depth += 1;
        if self.depth > MAX_QUERY_DEPTH {
            return Err(ScoringError::query(format!(
                "query nests deeper than {MAX_QUERY_DEPTH} levels"
            )));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<QueryNode, ScoringError> {
        let mut children = vec![self.parse_and()?];
        while self.peek() == Some(&Lexeme::Or) {
            self.pos += 1;
            children.push(self.parse_and()?);
        }
        Ok(collapse(children, QueryNode::Or))
    }

    fn parse_and(&mut self) -> Result<QueryNode, ScoringError> {
        let mut children = vec![self.parse_not()?];
        loop {
            match self.peek() {
                Some(Lexeme::And) => {
                    self.pos += 1;
                    children.push(self.parse_not()?);
                }
                // adjacent operands are an implicit AND
                Some(Lexeme::Operand(_) | Lexeme::Not | Lexeme::Open) => {
                    children.push(self.parse_not()?);
                }
                _ => break,
            }
        }
        Ok(collapse(children, QueryNode::And))
    }

    fn parse_not(&mut self) -> Result<QueryNode, ScoringError> {
        if self.peek() == Some(&Lexeme::Not) {
            self.pos += 1;
            self.descend()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(QueryNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<QueryNode, ScoringError> {
        match self.next() {
            Some(Lexeme::Operand(text)) => {
                let term = self.map.canonicalize(&text);
                let key = term.key();
                Ok(QueryNode::Term(QueryTerm {
                    word_key: Some(normalize_key(&text)),
                    ..QueryTerm::new(term, key)
                }))
            }
            Some(Lexeme::Open) => {
                if self.peek() == Some(&Lexeme::Close) {
                    return Err(ScoringError::query("empty parentheses"));
                }
                self.descend()?;
                let inner = self.parse_or()?;
                self.depth -= 1;
                match self.next() {
                    Some(Lexeme::Close) => Ok(inner),
                    _ => Err(ScoringError::query("missing closing parenthesis")),
                }
            }
            Some(Lexeme::Close) => Err(ScoringError::query("unexpected closing parenthesis")),
            Some(op) => Err(ScoringError::query(format!("operator {op:?} is missing an operand"))),
            None => Err(ScoringError::query("query ends with an operator")),
        }
    }
}

fn collapse(mut children: Vec<QueryNode>, wrap: fn(Vec<QueryNode>) -> QueryNode) -> QueryNode {
    if children.len() == 1 {
        children.remove(0)
    } else {
        wrap(children)
    }
}

/// Parses recruiter syntax: `AND`, `OR`, `NOT` (any case), parentheses,
/// `"quoted phrases"`, implicit AND between adjacent operands.
/// Precedence: NOT > AND > OR. Operands are canonicalized through `map`.
pub fn parse_query(query: &str, map: &NormalizationMap) -> Result<BooleanQuery, ScoringError> {
    let lexemes = lex(query)?;
    if lexemes.is_empty() {
        return Err(ScoringError::query("query is empty"));
    }
    let mut parser = Parser {
        lexemes,
        pos: 0,
        depth: 0,
        map,
    };
    let root = parser.parse_or()?;
    if let Some(rest) = parser.peek() {
        return Err(ScoringError::query(format!("unexpected {rest:?} after a complete expression")));
    }
    Ok(BooleanQuery { root: Some(root) })
}

/// A résumé offered to the search simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeText {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub matched_terms: Vec<Term>,
}

/// Résumés satisfying `query`, in input order.
pub fn search_resumes(
    query: &BooleanQuery,
    resumes: &[ResumeText],
    map: &NormalizationMap,
    max_ngram_length: usize,
) -> Vec<SearchHit> {
    resumes
        .iter()
        .filter_map(|resume| {
            let document = tokenize(&resume.text, map, max_ngram_length);
            let evaluation = evaluate(query, &document, true);
            evaluation.satisfied.then(|| SearchHit {
                id: resume.id.clone(),
                name: resume.name.clone(),
                matched_terms: evaluation
                    .leaves
                    .into_iter()
                    .filter(|leaf| leaf.matched && !leaf.negated)
                    .map(|leaf| leaf.term)
                    .collect(),
            })
        })
        .collect()
}
