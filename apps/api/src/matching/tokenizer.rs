//! Tokenizer/Canonicalizer — splits raw text into sentences, clauses and words,
//! then rewrites every word or known phrase through the Normalization Map.
//!
//! Phrase matching is greedy: inside one clause the longest map phrase (up to
//! `max_ngram_length` words) starting at the current word wins, left to right,
//! without overlap. Byte offsets into the source text are kept on every token
//! so reports can point back at the exact evidence.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matching::normalization::{normalize_key, NormalizationMap, Term};

/// Sentence breaks: terminal punctuation followed by whitespace, line breaks, semicolons, bullets.
static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?](?:\s|$)|[\n\r;•·▪]+").expect("valid sentence regex"));

/// Clause breaks inside a sentence. n-grams never span these.
static CLAUSE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,:()\[\]|]").expect("valid clause regex"));

/// A word may carry `+ # . / -` inside or `+ #` at the end: C++, C#, Node.js, CI/CD.
static WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}](?:[\p{L}\p{N}+#./\-]*[\p{L}\p{N}+#])?").expect("valid word regex")
});

pub const STOP_WORDS: &[&str] = &[
    "a", "about", "across", "also", "an", "and", "any", "are", "as", "at", "be", "been", "bonus",
    "both", "but", "by", "can", "do", "for", "from", "has", "have", "if", "in", "including",
    "into", "is", "it", "its", "job", "may", "more", "must", "nice", "not", "of", "on", "or",
    "our", "over", "plus", "preferred", "required", "should", "such", "than", "that", "the",
    "their", "this", "to", "up", "us", "using", "we", "what", "who", "will", "with", "within",
    "work", "you", "your",
];

pub fn is_stop_word(key: &str) -> bool {
    STOP_WORDS.binary_search(&key).is_ok()
}

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One canonicalized word or phrase.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalToken {
    pub term: Term,
    /// Comparison key of `term`.
    pub key: String,
    /// Source text covered by the token, as written.
    pub surface: String,
    pub span: Span,
    pub sentence: usize,
    pub clause: usize,
    /// Index of the token's first word among all words of the document.
    pub position: usize,
    pub word_count: usize,
    /// True when the token was resolved through the Normalization Map.
    pub dictionary: bool,
}

/// A single source word before phrase folding.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceWord {
    pub key: String,
    pub span: Span,
    pub clause: usize,
}

/// Ordered canonical tokens of one text. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalDocument {
    tokens: Vec<CanonicalToken>,
    words: Vec<SourceWord>,
    word_count: usize,
}

impl CanonicalDocument {
    pub fn tokens(&self) -> &[CanonicalToken] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Keys of all tokens, for membership checks.
    pub fn term_keys(&self) -> BTreeSet<&str> {
        self.tokens.iter().map(|t| t.key.as_str()).collect()
    }

    /// Spans where `key` occurs as a run of consecutive tokens inside one clause.
    pub fn find(&self, key: &str) -> Vec<Span> {
        if key.is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        for (i, first) in self.tokens.iter().enumerate() {
            if !key.starts_with(first.key.as_str()) {
                continue;
            }
            let mut joined = String::with_capacity(key.len());
            for token in &self.tokens[i..] {
                if token.clause != first.clause {
                    break;
                }
                if !joined.is_empty() {
                    joined.push(' ');
                }
                joined.push_str(&token.key);
                if joined == key {
                    spans.push(Span {
                        start: first.span.start,
                        end: token.span.end,
                    });
                    break;
                }
                if !key.starts_with(joined.as_str()) {
                    break;
                }
            }
        }
        spans
    }

    pub fn contains(&self, key: &str) -> bool {
        !self.find(key).is_empty()
    }

    pub fn words(&self) -> &[SourceWord] {
        &self.words
    }

    /// Spans where the words of `key` occur consecutively inside one clause,
    /// ignoring how the map folded them into phrases.
    pub fn find_words(&self, key: &str) -> Vec<Span> {
        let wanted: Vec<&str> = key.split(' ').filter(|w| !w.is_empty()).collect();
        if wanted.is_empty() || wanted.len() > self.words.len() {
            return Vec::new();
        }
        self.words
            .windows(wanted.len())
            .filter(|run| {
                run.iter().all(|w| w.clause == run[0].clause)
                    && run.iter().zip(&wanted).all(|(w, k)| w.key == *k)
            })
            .map(|run| Span {
                start: run[0].span.start,
                end: run[run.len() - 1].span.end,
            })
            .collect()
    }
}

/// Splits `text[start..end]` into the segments between matches of `re`.
fn segments(re: &Regex, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut cursor = start;
    for m in re.find_iter(&text[start..end]) {
        let (m_start, m_end) = (start + m.start(), start + m.end());
        if m_start > cursor {
            out.push((cursor, m_start));
        }
        cursor = m_end;
    }
    if cursor < end {
        out.push((cursor, end));
    }
    out
}

pub struct Tokenizer<'a> {
    map: &'a NormalizationMap,
    max_ngram_length: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(map: &'a NormalizationMap, max_ngram_length: usize) -> Self {
        Self {
            map,
            max_ngram_length: max_ngram_length.max(1),
        }
    }

    /// Builds the canonical document for `text`. Empty or whitespace-only text
    /// yields an empty document.
    pub fn tokenize(&self, text: &str) -> CanonicalDocument {
        let mut tokens = Vec::new();
        let mut source_words = Vec::new();
        let mut position = 0usize;
        let mut clause = 0usize;

        for (sentence, (s_start, s_end)) in segments(&SENTENCE_BREAK, text, 0, text.len())
            .into_iter()
            .enumerate()
        {
            for (c_start, c_end) in segments(&CLAUSE_BREAK, text, s_start, s_end) {
                let words: Vec<(usize, usize)> = WORD
                    .find_iter(&text[c_start..c_end])
                    .map(|m| (c_start + m.start(), c_start + m.end()))
                    .collect();
                if words.is_empty() {
                    continue;
                }
                let keys: Vec<String> = words
                    .iter()
                    .map(|&(start, end)| normalize_key(&text[start..end]))
                    .collect();

                let mut i = 0;
                while i < words.len() {
                    let (term, dictionary, width) = self.match_at(text, &words, &keys, i);
                    let span = Span {
                        start: words[i].0,
                        end: words[i + width - 1].1,
                    };
                    tokens.push(CanonicalToken {
                        key: term.key(),
                        term,
                        surface: text[span.start..span.end].to_string(),
                        span,
                        sentence,
                        clause,
                        position: position + i,
                        word_count: width,
                        dictionary,
                    });
                    i += width;
                }
                source_words.extend(words.iter().zip(keys).map(|(&(start, end), key)| {
                    SourceWord {
                        key,
                        span: Span { start, end },
                        clause,
                    }
                }));
                position += words.len();
                clause += 1;
            }
        }

        CanonicalDocument {
            tokens,
            words: source_words,
            word_count: position,
        }
    }

    /// Longest map phrase starting at word `i`, else the single word.
    fn match_at(
        &self,
        text: &str,
        words: &[(usize, usize)],
        keys: &[String],
        i: usize,
    ) -> (Term, bool, usize) {
        let longest = self.max_ngram_length.min(words.len() - i);
        for width in (1..=longest).rev() {
            let phrase = keys[i..i + width].join(" ");
            if let Some(term) = self.map.lookup_key(&phrase) {
                return (term.clone(), true, width);
            }
        }
        let (start, end) = words[i];
        (Term::new(&text[start..end]), false, 1)
    }
}

/// Convenience wrapper around [`Tokenizer`].
pub fn tokenize(text: &str, map: &NormalizationMap, max_ngram_length: usize) -> CanonicalDocument {
    Tokenizer::new(map, max_ngram_length).tokenize(text)
}
