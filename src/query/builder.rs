//! JSON description of query trees.
//!
//! An [`ItemSpec`] is a serde-friendly mirror of one item and its subtree.
//! Items reference each other by `label`; a `connect` entry names the label
//! of its target, so edges may point forwards or backwards in the document.
//!
//! ```json
//! {"type": "and", "children": [
//!   {"type": "word", "word": "new", "label": "a", "connect": {"to": "b", "weight": 0.8}},
//!   {"type": "word", "word": "york", "label": "b"}
//! ]}
//! ```

use crate::query::error::{QueryError, Result};
use crate::query::item::{DEFAULT_NEAR_DISTANCE, DEFAULT_WEAK_AND_HITS, DEFAULT_WEIGHT, Item, ItemKind};
use crate::query::range::{MultiRange, NumberType};
use crate::query::terms::{
    Alternative, FuzzyTerm, GeoLocationTerm, LocationTerm, NearestNeighborTerm, NumericInTerm,
    PredicateQueryTerm, StringInTerm, WandTerm, WeightedEntry, WeightedSetTerm, WordAlternatives,
};
use crate::query::tree::QueryTree;
use crate::query::types::ItemId;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// One item with its shared attributes and subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(flatten)]
    pub kind: KindSpec,
    #[serde(default = "default_weight", skip_serializing_if = "is_default_weight")]
    pub weight: i32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub filter: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unranked: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_position_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub significance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConnectSpec>,
    /// Lock a phrase segment after building
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
}

/// Connectivity edge to the item labelled `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectSpec {
    pub to: String,
    pub weight: f64,
}

/// Kind-specific part of an [`ItemSpec`]. NOT takes its positive branch first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindSpec {
    And {
        children: Vec<ItemSpec>,
    },
    Or {
        children: Vec<ItemSpec>,
    },
    Not {
        children: Vec<ItemSpec>,
    },
    Rank {
        children: Vec<ItemSpec>,
    },
    Equiv {
        children: Vec<ItemSpec>,
    },
    Near {
        #[serde(default = "default_distance")]
        distance: u32,
        children: Vec<ItemSpec>,
    },
    #[serde(rename = "onear")]
    ONear {
        #[serde(default = "default_distance")]
        distance: u32,
        children: Vec<ItemSpec>,
    },
    WeakAnd {
        #[serde(default = "default_target_hits")]
        target_hits: u32,
        #[serde(default)]
        index: String,
        children: Vec<ItemSpec>,
    },
    SameElement {
        field: String,
        children: Vec<ItemSpec>,
    },
    Phrase {
        #[serde(default)]
        index: String,
        #[serde(default = "default_true")]
        explicit: bool,
        children: Vec<ItemSpec>,
    },
    Segment {
        #[serde(default)]
        index: String,
        raw_word: String,
        children: Vec<ItemSpec>,
    },
    Word {
        #[serde(default)]
        index: String,
        word: String,
    },
    Prefix {
        #[serde(default)]
        index: String,
        word: String,
    },
    Substring {
        #[serde(default)]
        index: String,
        word: String,
    },
    Suffix {
        #[serde(default)]
        index: String,
        word: String,
    },
    Exact {
        #[serde(default)]
        index: String,
        word: String,
    },
    Bool {
        #[serde(default)]
        index: String,
        value: bool,
    },
    Int {
        #[serde(default)]
        index: String,
        expression: String,
    },
    Regexp {
        #[serde(default)]
        index: String,
        pattern: String,
    },
    Fuzzy {
        #[serde(default)]
        index: String,
        word: String,
        #[serde(default = "default_edit_distance")]
        max_edit_distance: u32,
        #[serde(default)]
        prefix_length: u32,
        #[serde(default)]
        prefix_match: bool,
    },
    WordAlternatives {
        #[serde(default)]
        index: String,
        alternatives: Vec<Alternative>,
    },
    Location(LocationTerm),
    GeoLocation(GeoLocationTerm),
    NearestNeighbor {
        field: String,
        query_tensor_name: String,
        target_hits: u32,
        #[serde(default = "default_true")]
        allow_approximate: bool,
        #[serde(default)]
        explore_additional_hits: u32,
        /// Absent means no threshold
        #[serde(default, skip_serializing_if = "Option::is_none")]
        distance_threshold: Option<f64>,
    },
    Predicate(PredicateQueryTerm),
    WeightedSet {
        index: String,
        entries: Vec<WeightedEntry>,
    },
    DotProduct {
        index: String,
        entries: Vec<WeightedEntry>,
    },
    Wand {
        index: String,
        #[serde(default = "default_target_hits")]
        target_hits: u32,
        #[serde(default)]
        score_threshold: f64,
        #[serde(default = "default_boost")]
        threshold_boost_factor: f64,
        entries: Vec<WeightedEntry>,
    },
    StringIn {
        index: String,
        tokens: Vec<String>,
    },
    NumericIn {
        index: String,
        values: Vec<i64>,
    },
    MultiRange {
        #[serde(default)]
        number_type: NumberType,
        start_index: String,
        /// Same as `start_index` when absent
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_index: Option<String>,
        #[serde(default = "default_true")]
        start_inclusive: bool,
        #[serde(default = "default_true")]
        end_inclusive: bool,
        intervals: Vec<[f64; 2]>,
    },
    True,
    False,
    Null,
}

fn default_weight() -> i32 {
    DEFAULT_WEIGHT
}

fn is_default_weight(weight: &i32) -> bool {
    *weight == DEFAULT_WEIGHT
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

fn default_distance() -> u32 {
    DEFAULT_NEAR_DISTANCE
}

fn default_target_hits() -> u32 {
    DEFAULT_WEAK_AND_HITS
}

fn default_edit_distance() -> u32 {
    FuzzyTerm::DEFAULT_MAX_EDIT_DISTANCE
}

fn default_boost() -> f64 {
    1.0
}

impl ItemSpec {
    /// Spec with default attributes
    pub fn new(kind: KindSpec) -> Self {
        Self {
            kind,
            weight: DEFAULT_WEIGHT,
            filter: false,
            unranked: false,
            no_position_data: false,
            label: None,
            significance: None,
            connect: None,
            locked: false,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Build a tree with this spec as its query root
    pub fn build(&self) -> Result<QueryTree> {
        let mut builder = Builder::default();
        let root = builder.item(self)?;
        builder.tree.set_query_root(root)?;
        builder.finish()
    }
}

#[derive(Default)]
struct Builder {
    tree: QueryTree,
    labels: AHashMap<String, ItemId>,
    edges: Vec<(ItemId, String, f64)>,
    locks: Vec<ItemId>,
}

impl Builder {
    fn item(&mut self, spec: &ItemSpec) -> Result<ItemId> {
        let mut item = Item::new(self.kind(&spec.kind)?)
            .with_weight(spec.weight)
            .with_filter(spec.filter)
            .with_ranked(!spec.unranked);
        item.set_position_data(!spec.no_position_data);
        let id = self.tree.create(item);

        if let Some(children) = spec.kind.children() {
            let is_not = matches!(spec.kind, KindSpec::Not { .. });
            for (i, child) in children.iter().enumerate() {
                let child = self.item(child)?;
                if is_not && i == 0 {
                    self.tree.set_positive(id, child)?;
                } else {
                    self.tree.add(id, child)?;
                }
            }
        }

        if let Some(label) = &spec.label {
            self.tree.set_label(id, label.as_str())?;
            self.labels.entry(label.clone()).or_insert(id);
        }
        if let Some(significance) = spec.significance {
            self.tree.set_significance(id, significance)?;
        }
        if let Some(connect) = &spec.connect {
            self.edges.push((id, connect.to.clone(), connect.weight));
        }
        if spec.locked {
            self.locks.push(id);
        }
        Ok(id)
    }

    fn kind(&self, spec: &KindSpec) -> Result<ItemKind> {
        let kind = match spec {
            KindSpec::And { .. } => ItemKind::And,
            KindSpec::Or { .. } => ItemKind::Or,
            KindSpec::Not { .. } => ItemKind::Not,
            KindSpec::Rank { .. } => ItemKind::Rank,
            KindSpec::Equiv { .. } => ItemKind::Equiv,
            KindSpec::Near { distance, .. } => ItemKind::Near { distance: *distance },
            KindSpec::ONear { distance, .. } => ItemKind::ONear { distance: *distance },
            KindSpec::WeakAnd { target_hits, index, .. } => ItemKind::WeakAnd {
                target_hits: *target_hits,
                index: index.clone(),
            },
            KindSpec::SameElement { field, .. } => ItemKind::SameElement { field: field.clone() },
            KindSpec::Phrase { index, explicit, .. } => ItemKind::Phrase {
                index: index.clone(),
                explicit: *explicit,
            },
            KindSpec::Segment { index, raw_word, .. } => Item::segment(index.as_str(), raw_word.as_str()).into_kind(),
            KindSpec::Word { index, word } => Item::word_in(index.as_str(), word.as_str()).into_kind(),
            KindSpec::Prefix { index, word } => Item::prefix(index.as_str(), word.as_str()).into_kind(),
            KindSpec::Substring { index, word } => Item::substring(index.as_str(), word.as_str()).into_kind(),
            KindSpec::Suffix { index, word } => Item::suffix(index.as_str(), word.as_str()).into_kind(),
            KindSpec::Exact { index, word } => Item::exact(index.as_str(), word.as_str()).into_kind(),
            KindSpec::Bool { index, value } => Item::boolean(index.as_str(), *value).into_kind(),
            KindSpec::Int { index, expression } => Item::int(index.as_str(), expression)?.into_kind(),
            KindSpec::Regexp { index, pattern } => Item::regexp(index.as_str(), pattern.as_str())?.into_kind(),
            KindSpec::Fuzzy {
                index,
                word,
                max_edit_distance,
                prefix_length,
                prefix_match,
            } => {
                let mut term = FuzzyTerm::new(index.as_str(), word.as_str());
                term.max_edit_distance = *max_edit_distance;
                term.prefix_length = *prefix_length;
                term.prefix_match = *prefix_match;
                ItemKind::Fuzzy(term)
            }
            KindSpec::WordAlternatives { index, alternatives } => {
                let mut term = WordAlternatives::new(index.as_str());
                for alternative in alternatives {
                    term.add(alternative.word.as_str(), alternative.exactness);
                }
                ItemKind::WordAlternatives(term)
            }
            KindSpec::Location(term) => ItemKind::Location(term.clone()),
            KindSpec::GeoLocation(term) => ItemKind::GeoLocation(term.clone()),
            KindSpec::NearestNeighbor {
                field,
                query_tensor_name,
                target_hits,
                allow_approximate,
                explore_additional_hits,
                distance_threshold,
            } => {
                let mut term = NearestNeighborTerm::new(field.as_str(), query_tensor_name.as_str());
                term.target_hits = *target_hits;
                term.allow_approximate = *allow_approximate;
                term.explore_additional_hits = *explore_additional_hits;
                if let Some(threshold) = distance_threshold {
                    term.distance_threshold = *threshold;
                }
                ItemKind::NearestNeighbor(term)
            }
            KindSpec::Predicate(term) => ItemKind::PredicateQuery(term.clone()),
            KindSpec::WeightedSet { index, entries } => ItemKind::WeightedSet(weighted_set(index, entries)),
            KindSpec::DotProduct { index, entries } => ItemKind::DotProduct(weighted_set(index, entries)),
            KindSpec::Wand {
                index,
                target_hits,
                score_threshold,
                threshold_boost_factor,
                entries,
            } => ItemKind::Wand(WandTerm {
                set: weighted_set(index, entries),
                target_hits: *target_hits,
                score_threshold: *score_threshold,
                threshold_boost_factor: *threshold_boost_factor,
            }),
            KindSpec::StringIn { index, tokens } => {
                let mut term = StringInTerm::new(index.as_str());
                for token in tokens {
                    term.add(token.as_str());
                }
                ItemKind::StringIn(term)
            }
            KindSpec::NumericIn { index, values } => {
                let mut term = NumericInTerm::new(index.as_str());
                for &value in values {
                    term.add(value);
                }
                ItemKind::NumericIn(term)
            }
            KindSpec::MultiRange {
                number_type,
                start_index,
                end_index,
                start_inclusive,
                end_inclusive,
                intervals,
            } => {
                let mut ranges = MultiRange::between(
                    *number_type,
                    start_index.as_str(),
                    *start_inclusive,
                    end_index.as_deref().unwrap_or(start_index),
                    *end_inclusive,
                );
                for &[start, end] in intervals {
                    ranges.add(start, end)?;
                }
                ItemKind::MultiRange(ranges)
            }
            KindSpec::True => ItemKind::True,
            KindSpec::False => ItemKind::False,
            KindSpec::Null => ItemKind::Null,
        };
        Ok(kind)
    }

    /// Resolve label references, then freeze segments
    fn finish(mut self) -> Result<QueryTree> {
        for (from, label, weight) in std::mem::take(&mut self.edges) {
            let to = *self
                .labels
                .get(&label)
                .ok_or_else(|| QueryError::UnknownLabel(label.clone()))?;
            self.tree.set_connectivity(from, to, weight)?;
        }
        for id in std::mem::take(&mut self.locks) {
            self.tree.lock_segment(id)?;
        }
        Ok(self.tree)
    }
}

fn weighted_set(index: &str, entries: &[WeightedEntry]) -> WeightedSetTerm {
    let mut set = WeightedSetTerm::new(index);
    for entry in entries {
        set.add_token(entry.token.clone(), entry.weight);
    }
    set
}

impl KindSpec {
    fn children(&self) -> Option<&[ItemSpec]> {
        match self {
            KindSpec::And { children }
            | KindSpec::Or { children }
            | KindSpec::Not { children }
            | KindSpec::Rank { children }
            | KindSpec::Equiv { children }
            | KindSpec::Near { children, .. }
            | KindSpec::ONear { children, .. }
            | KindSpec::WeakAnd { children, .. }
            | KindSpec::SameElement { children, .. }
            | KindSpec::Phrase { children, .. }
            | KindSpec::Segment { children, .. } => Some(children),
            _ => None,
        }
    }
}

impl QueryTree {
    /// Describe the query as an [`ItemSpec`]; `None` for an empty tree.
    ///
    /// Connectivity targets without a label are given `u<unique id>`.
    pub fn to_spec(&self) -> Option<ItemSpec> {
        self.query_root().and_then(|root| self.spec_of(root))
    }

    fn spec_of(&self, id: ItemId) -> Option<ItemSpec> {
        let item = self.item(id).ok()?;
        let children = || -> Vec<ItemSpec> {
            self.children(id)
                .iter()
                .filter_map(|&child| self.spec_of(child))
                .collect()
        };
        let kind = match item.kind() {
            ItemKind::And => KindSpec::And { children: children() },
            ItemKind::Or => KindSpec::Or { children: children() },
            ItemKind::Not => KindSpec::Not { children: children() },
            ItemKind::Rank => KindSpec::Rank { children: children() },
            ItemKind::Equiv => KindSpec::Equiv { children: children() },
            ItemKind::Near { distance } => KindSpec::Near {
                distance: *distance,
                children: children(),
            },
            ItemKind::ONear { distance } => KindSpec::ONear {
                distance: *distance,
                children: children(),
            },
            ItemKind::WeakAnd { target_hits, index } => KindSpec::WeakAnd {
                target_hits: *target_hits,
                index: index.clone(),
                children: children(),
            },
            ItemKind::SameElement { field } => KindSpec::SameElement {
                field: field.clone(),
                children: children(),
            },
            ItemKind::Phrase { index, explicit } => KindSpec::Phrase {
                index: index.clone(),
                explicit: *explicit,
                children: children(),
            },
            ItemKind::PhraseSegment { index, raw_word, .. } => KindSpec::Segment {
                index: index.clone(),
                raw_word: raw_word.clone(),
                children: children(),
            },
            ItemKind::Word(t) => KindSpec::Word {
                index: t.index.clone(),
                word: t.word.clone(),
            },
            ItemKind::Prefix(t) => KindSpec::Prefix {
                index: t.index.clone(),
                word: t.word.clone(),
            },
            ItemKind::Substring(t) => KindSpec::Substring {
                index: t.index.clone(),
                word: t.word.clone(),
            },
            ItemKind::Suffix(t) => KindSpec::Suffix {
                index: t.index.clone(),
                word: t.word.clone(),
            },
            ItemKind::Exact(t) => KindSpec::Exact {
                index: t.index.clone(),
                word: t.word.clone(),
            },
            ItemKind::Bool(t) => KindSpec::Bool {
                index: t.index.clone(),
                value: t.value,
            },
            ItemKind::Int(t) => KindSpec::Int {
                index: t.index.clone(),
                expression: t.expression(),
            },
            ItemKind::RegExp(t) => KindSpec::Regexp {
                index: t.index.clone(),
                pattern: t.pattern().to_string(),
            },
            ItemKind::Fuzzy(t) => KindSpec::Fuzzy {
                index: t.index.clone(),
                word: t.word.clone(),
                max_edit_distance: t.max_edit_distance,
                prefix_length: t.prefix_length,
                prefix_match: t.prefix_match,
            },
            ItemKind::WordAlternatives(t) => KindSpec::WordAlternatives {
                index: t.index.clone(),
                alternatives: t.alternatives().to_vec(),
            },
            ItemKind::Location(t) => KindSpec::Location(t.clone()),
            ItemKind::GeoLocation(t) => KindSpec::GeoLocation(t.clone()),
            ItemKind::NearestNeighbor(t) => KindSpec::NearestNeighbor {
                field: t.field.clone(),
                query_tensor_name: t.query_tensor_name.clone(),
                target_hits: t.target_hits,
                allow_approximate: t.allow_approximate,
                explore_additional_hits: t.explore_additional_hits,
                distance_threshold: t.distance_threshold.is_finite().then_some(t.distance_threshold),
            },
            ItemKind::PredicateQuery(t) => KindSpec::Predicate(t.clone()),
            ItemKind::WeightedSet(set) => KindSpec::WeightedSet {
                index: set.index.clone(),
                entries: set.entries().to_vec(),
            },
            ItemKind::DotProduct(set) => KindSpec::DotProduct {
                index: set.index.clone(),
                entries: set.entries().to_vec(),
            },
            ItemKind::Wand(wand) => KindSpec::Wand {
                index: wand.set.index.clone(),
                target_hits: wand.target_hits,
                score_threshold: wand.score_threshold,
                threshold_boost_factor: wand.threshold_boost_factor,
                entries: wand.set.entries().to_vec(),
            },
            ItemKind::StringIn(t) => KindSpec::StringIn {
                index: t.index.clone(),
                tokens: t.tokens().to_vec(),
            },
            ItemKind::NumericIn(t) => KindSpec::NumericIn {
                index: t.index.clone(),
                values: t.values().to_vec(),
            },
            ItemKind::MultiRange(ranges) => KindSpec::MultiRange {
                number_type: ranges.number_type,
                start_index: ranges.start_index.clone(),
                end_index: (!ranges.is_single_field()).then(|| ranges.end_index.clone()),
                start_inclusive: ranges.start_inclusive,
                end_inclusive: ranges.end_inclusive,
                intervals: ranges.merged().iter().map(|i| [i.start, i.end]).collect(),
            },
            // Words inside weighted sets are not tree nodes
            ItemKind::PureWeightedString(_) | ItemKind::PureWeightedInteger(_) => return None,
            ItemKind::True => KindSpec::True,
            ItemKind::False => KindSpec::False,
            ItemKind::Null => KindSpec::Null,
            ItemKind::Root => return self.child(id, 0).and_then(|child| self.spec_of(child)),
        };

        let mut spec = ItemSpec::new(kind);
        spec.weight = item.weight();
        spec.filter = item.is_filter();
        spec.unranked = !item.is_ranked();
        spec.no_position_data = !item.uses_position_data();
        spec.label = self.spec_label(id);
        spec.significance = item.significance();
        spec.connect = self.connectivity(id).and_then(|edge| {
            Some(ConnectSpec {
                to: self.spec_label(edge.target)?,
                weight: edge.weight,
            })
        });
        spec.locked = self.locked_segment(id).is_some();
        Some(spec)
    }

    fn spec_label(&self, id: ItemId) -> Option<String> {
        let item = self.item(id).ok()?;
        if let Some(label) = item.label() {
            return Some(label.to_string());
        }
        self.connected_backlink(id)?;
        item.unique_id().map(|uid| format!("u{}", uid))
    }
}
