//! Payloads of leaf items

use crate::query::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Word-like term: WORD, PREFIX, SUBSTRING, SUFFIX and EXACT items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTerm {
    pub index: String,
    pub word: String,
    /// Typed by the user, as opposed to added by a rewriter
    #[serde(default = "default_true")]
    pub from_query: bool,
    #[serde(default)]
    pub stemmed: bool,
    #[serde(default)]
    pub lowercased: bool,
}

fn default_true() -> bool {
    true
}

impl WordTerm {
    pub fn new(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            word: word.into(),
            from_query: true,
            stemmed: false,
            lowercased: false,
        }
    }
}

/// Boolean attribute match, sent to the backend as a WORD with `true`/`false`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoolTerm {
    pub index: String,
    pub value: bool,
}

impl BoolTerm {
    pub fn word(&self) -> &'static str {
        if self.value { "true" } else { "false" }
    }
}

/// Regular expression match. The pattern is validated on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegExpTerm {
    pub index: String,
    pattern: String,
}

impl RegExpTerm {
    pub fn new(index: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if let Err(e) = regex::Regex::new(&pattern) {
            return Err(QueryError::InvalidRegex {
                pattern,
                reason: e.to_string(),
            });
        }
        Ok(Self {
            index: index.into(),
            pattern,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Approximate match within an edit distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyTerm {
    pub index: String,
    pub word: String,
    pub max_edit_distance: u32,
    /// Leading characters that must match exactly
    pub prefix_length: u32,
    /// Match the word as a fuzzy prefix of the field value
    pub prefix_match: bool,
}

impl FuzzyTerm {
    pub const DEFAULT_MAX_EDIT_DISTANCE: u32 = 2;

    pub fn new(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            word: word.into(),
            max_edit_distance: Self::DEFAULT_MAX_EDIT_DISTANCE,
            prefix_length: 0,
            prefix_match: false,
        }
    }
}

/// One surface form of a word alternatives item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub word: String,
    /// How close this form is to what the user typed, in `[0, 1]`
    pub exactness: f64,
}

/// Set of surface forms for one word position (stems, spelling variants ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordAlternatives {
    pub index: String,
    alternatives: Vec<Alternative>,
}

impl WordAlternatives {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            alternatives: Vec::new(),
        }
    }

    /// Add a surface form. An existing form keeps the higher exactness;
    /// returns false when the add was dropped.
    pub fn add(&mut self, word: impl Into<String>, exactness: f64) -> bool {
        let word = word.into();
        let exactness = exactness.clamp(0.0, 1.0);
        match self.alternatives.iter_mut().find(|a| a.word == word) {
            Some(existing) if existing.exactness >= exactness => false,
            Some(existing) => {
                existing.exactness = exactness;
                true
            }
            None => {
                self.alternatives.push(Alternative { word, exactness });
                true
            }
        }
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// The most exact surface form (first one on ties)
    pub fn best(&self) -> Option<&Alternative> {
        self.alternatives
            .iter()
            .fold(None, |best: Option<&Alternative>, a| match best {
                Some(b) if b.exactness >= a.exactness => Some(b),
                _ => Some(a),
            })
    }
}

/// Legacy 2D position match in integer coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTerm {
    pub index: String,
    pub x: i64,
    pub y: i64,
    /// Negative means unbounded
    pub radius: i64,
    /// Longitude scaling factor times 2^32, 0 when not used
    #[serde(default)]
    pub aspect: u32,
}

impl LocationTerm {
    /// Canonical location string read by the backend
    pub fn location(&self) -> String {
        format!("(2,{},{},{},0,1,0,{})", self.x, self.y, self.radius, self.aspect)
    }
}

/// Geographic circle (or point when unbounded) in degrees and meters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocationTerm {
    pub index: String,
    pub latitude: f64,
    pub longitude: f64,
    /// `None` is unbounded
    pub radius_meters: Option<f64>,
}

/// Approximate nearest neighbor search against a tensor field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighborTerm {
    pub field: String,
    pub query_tensor_name: String,
    pub target_hits: u32,
    pub allow_approximate: bool,
    pub explore_additional_hits: u32,
    pub distance_threshold: f64,
}

impl NearestNeighborTerm {
    pub fn new(field: impl Into<String>, query_tensor_name: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            query_tensor_name: query_tensor_name.into(),
            target_hits: 0,
            allow_approximate: true,
            explore_additional_hits: 0,
            distance_threshold: f64::INFINITY,
        }
    }
}

/// Feature of a predicate query: `key=value` for the sub-queries in the bitmap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateFeature {
    pub key: String,
    pub value: String,
    pub sub_query_bitmap: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateRangeFeature {
    pub key: String,
    pub value: i64,
    pub sub_query_bitmap: u64,
}

/// Query against a predicate field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredicateQueryTerm {
    pub index: String,
    #[serde(default)]
    pub features: Vec<PredicateFeature>,
    #[serde(default)]
    pub range_features: Vec<PredicateRangeFeature>,
}

impl PredicateQueryTerm {
    pub const ALL_SUB_QUERIES: u64 = u64::MAX;

    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            features: Vec::new(),
            range_features: Vec::new(),
        }
    }

    pub fn add_feature(&mut self, key: impl Into<String>, value: impl Into<String>, sub_query_bitmap: u64) {
        self.features.push(PredicateFeature {
            key: key.into(),
            value: value.into(),
            sub_query_bitmap,
        });
    }

    pub fn add_range_feature(&mut self, key: impl Into<String>, value: i64, sub_query_bitmap: u64) {
        self.range_features.push(PredicateRangeFeature {
            key: key.into(),
            value,
            sub_query_bitmap,
        });
    }
}

/// Key of a weighted set entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Integer(i64),
    String(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Integer(n) => write!(f, "{}", n),
            Token::String(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEntry {
    pub token: Token,
    pub weight: i32,
}

/// Tokens with individual weights; payload of WEIGHTEDSET and DOTPRODUCT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSetTerm {
    pub index: String,
    entries: Vec<WeightedEntry>,
}

impl WeightedSetTerm {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            entries: Vec::new(),
        }
    }

    /// Add or reweight a token. Returns the previous weight.
    pub fn add_token(&mut self, token: Token, weight: i32) -> Option<i32> {
        match self.entries.iter_mut().find(|e| e.token == token) {
            Some(existing) => Some(std::mem::replace(&mut existing.weight, weight)),
            None => {
                self.entries.push(WeightedEntry { token, weight });
                None
            }
        }
    }

    pub fn remove_token(&mut self, token: &Token) -> Option<i32> {
        let pos = self.entries.iter().position(|e| &e.token == token)?;
        Some(self.entries.remove(pos).weight)
    }

    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Weak AND over a weighted set, evaluated with a score threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandTerm {
    pub set: WeightedSetTerm,
    pub target_hits: u32,
    pub score_threshold: f64,
    pub threshold_boost_factor: f64,
}

impl WandTerm {
    pub fn new(index: impl Into<String>, target_hits: u32) -> Self {
        Self {
            set: WeightedSetTerm::new(index),
            target_hits,
            score_threshold: 0.0,
            threshold_boost_factor: 1.0,
        }
    }
}

/// Field value must equal one of a set of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringInTerm {
    pub index: String,
    tokens: Vec<String>,
}

impl StringInTerm {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            tokens: Vec::new(),
        }
    }

    pub fn add(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();
        if self.tokens.contains(&token) {
            return false;
        }
        self.tokens.push(token);
        true
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// Field value must equal one of a set of integers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericInTerm {
    pub index: String,
    values: Vec<i64>,
}

impl NumericInTerm {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            values: Vec::new(),
        }
    }

    pub fn add(&mut self, value: i64) -> bool {
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}
