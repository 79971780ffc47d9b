//! Query items: the closed set of node kinds and their shared attributes

use crate::query::error::Result;
use crate::query::range::{IntTerm, MultiRange};
use crate::query::terms::{
    BoolTerm, FuzzyTerm, GeoLocationTerm, LocationTerm, NearestNeighborTerm, NumericInTerm,
    PredicateQueryTerm, RegExpTerm, StringInTerm, WandTerm, WeightedSetTerm, WordAlternatives,
    WordTerm,
};
use crate::query::types::{ItemFlags, ItemType, Language};

/// Default item weight
pub const DEFAULT_WEIGHT: i32 = 100;

/// Default NEAR/ONEAR window
pub const DEFAULT_NEAR_DISTANCE: u32 = 2;

/// Default WEAKAND target hits
pub const DEFAULT_WEAK_AND_HITS: u32 = 100;

/// Kind of an item together with its kind-specific payload
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    And,
    Or,
    /// Child 0 is the positive branch, the rest are excluded
    Not,
    /// Child 0 decides matching, the rest only contribute to ranking
    Rank,
    Equiv,
    Near { distance: u32 },
    ONear { distance: u32 },
    WeakAnd { target_hits: u32, index: String },
    SameElement { field: String },
    Phrase { index: String, explicit: bool },
    /// Phrase produced by splitting one written word into several tokens
    PhraseSegment { index: String, raw_word: String, explicit: bool },

    Word(WordTerm),
    Prefix(WordTerm),
    Substring(WordTerm),
    Suffix(WordTerm),
    Exact(WordTerm),
    Bool(BoolTerm),
    Int(IntTerm),
    RegExp(RegExpTerm),
    Fuzzy(FuzzyTerm),
    WordAlternatives(WordAlternatives),
    Location(LocationTerm),
    GeoLocation(GeoLocationTerm),
    NearestNeighbor(NearestNeighborTerm),
    PredicateQuery(PredicateQueryTerm),
    WeightedSet(WeightedSetTerm),
    DotProduct(WeightedSetTerm),
    Wand(WandTerm),
    StringIn(StringInTerm),
    NumericIn(NumericInTerm),
    PureWeightedString(String),
    PureWeightedInteger(i64),
    MultiRange(MultiRange),

    True,
    False,
    /// Placeholder; never survives canonicalization
    Null,
    /// Wrapper holding the query root
    Root,
}

impl ItemKind {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::And => ItemType::And,
            ItemKind::Or => ItemType::Or,
            ItemKind::Not => ItemType::Not,
            ItemKind::Rank => ItemType::Rank,
            ItemKind::Equiv => ItemType::Equiv,
            ItemKind::Near { .. } => ItemType::Near,
            ItemKind::ONear { .. } => ItemType::ONear,
            ItemKind::WeakAnd { .. } => ItemType::WeakAnd,
            ItemKind::SameElement { .. } => ItemType::SameElement,
            ItemKind::Phrase { .. } => ItemType::Phrase,
            ItemKind::PhraseSegment { .. } => ItemType::PhraseSegment,
            ItemKind::Word(_) => ItemType::Word,
            ItemKind::Prefix(_) => ItemType::Prefix,
            ItemKind::Substring(_) => ItemType::Substring,
            ItemKind::Suffix(_) => ItemType::Suffix,
            ItemKind::Exact(_) => ItemType::Exact,
            ItemKind::Bool(_) => ItemType::Bool,
            ItemKind::Int(_) => ItemType::Int,
            ItemKind::RegExp(_) => ItemType::RegExp,
            ItemKind::Fuzzy(_) => ItemType::Fuzzy,
            ItemKind::WordAlternatives(_) => ItemType::WordAlternatives,
            ItemKind::Location(_) => ItemType::LocationTerm,
            ItemKind::GeoLocation(_) => ItemType::GeoLocationTerm,
            ItemKind::NearestNeighbor(_) => ItemType::NearestNeighbor,
            ItemKind::PredicateQuery(_) => ItemType::PredicateQuery,
            ItemKind::WeightedSet(_) => ItemType::WeightedSet,
            ItemKind::DotProduct(_) => ItemType::DotProduct,
            ItemKind::Wand(_) => ItemType::Wand,
            ItemKind::StringIn(_) => ItemType::StringIn,
            ItemKind::NumericIn(_) => ItemType::NumericIn,
            ItemKind::PureWeightedString(_) => ItemType::PureWeightedString,
            ItemKind::PureWeightedInteger(_) => ItemType::PureWeightedInteger,
            ItemKind::MultiRange(_) => ItemType::MultiRange,
            ItemKind::True => ItemType::True,
            ItemKind::False => ItemType::False,
            ItemKind::Null => ItemType::Null,
            ItemKind::Root => ItemType::Root,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            ItemKind::And
                | ItemKind::Or
                | ItemKind::Not
                | ItemKind::Rank
                | ItemKind::Equiv
                | ItemKind::Near { .. }
                | ItemKind::ONear { .. }
                | ItemKind::WeakAnd { .. }
                | ItemKind::SameElement { .. }
                | ItemKind::Phrase { .. }
                | ItemKind::PhraseSegment { .. }
                | ItemKind::Root
        )
    }

    /// Single-term leaves that match one token (or number) in one field
    pub fn is_term(&self) -> bool {
        matches!(
            self,
            ItemKind::Word(_)
                | ItemKind::Prefix(_)
                | ItemKind::Substring(_)
                | ItemKind::Suffix(_)
                | ItemKind::Exact(_)
                | ItemKind::Bool(_)
                | ItemKind::Int(_)
                | ItemKind::RegExp(_)
                | ItemKind::Fuzzy(_)
                | ItemKind::WordAlternatives(_)
                | ItemKind::Location(_)
                | ItemKind::GeoLocation(_)
                | ItemKind::PureWeightedString(_)
                | ItemKind::PureWeightedInteger(_)
        )
    }

    fn is_word_like(&self) -> bool {
        matches!(
            self,
            ItemKind::Word(_)
                | ItemKind::Prefix(_)
                | ItemKind::Substring(_)
                | ItemKind::Suffix(_)
                | ItemKind::Exact(_)
        )
    }

    /// Items that may carry a unique id, connectivity and significance
    pub fn is_taggable(&self) -> bool {
        self.is_term()
            || matches!(
                self,
                ItemKind::Phrase { .. }
                    | ItemKind::PhraseSegment { .. }
                    | ItemKind::Equiv
                    | ItemKind::SameElement { .. }
                    | ItemKind::WeightedSet(_)
                    | ItemKind::DotProduct(_)
                    | ItemKind::Wand(_)
                    | ItemKind::NearestNeighbor(_)
                    | ItemKind::PredicateQuery(_)
                    | ItemKind::StringIn(_)
                    | ItemKind::NumericIn(_)
                    | ItemKind::MultiRange(_)
            )
    }

    /// Whether a single-child composite may be replaced by its child.
    ///
    /// SAME_ELEMENT and WEAKAND carry field or hit semantics, and EQUIV marks
    /// its child as a synonym group member, so those stay in place.
    pub fn is_reducible(&self) -> bool {
        self.is_composite()
            && !matches!(
                self,
                ItemKind::SameElement { .. } | ItemKind::WeakAnd { .. } | ItemKind::Equiv | ItemKind::Root
            )
    }

    /// Operator-specific legality of `child` under a composite of this kind
    pub fn accepts_child(&self, child: &ItemKind) -> bool {
        match self {
            ItemKind::Equiv => matches!(
                child,
                ItemKind::Word(_)
                    | ItemKind::WordAlternatives(_)
                    | ItemKind::Int(_)
                    | ItemKind::Exact(_)
                    | ItemKind::Phrase { .. }
            ),
            ItemKind::SameElement { .. } => child.is_term(),
            ItemKind::Near { .. } | ItemKind::ONear { .. } => {
                child.is_term()
                    || matches!(
                        child,
                        ItemKind::Phrase { .. } | ItemKind::PhraseSegment { .. } | ItemKind::Equiv
                    )
            }
            ItemKind::Phrase { .. } => {
                child.is_word_like()
                    || matches!(
                        child,
                        ItemKind::Int(_)
                            | ItemKind::WordAlternatives(_)
                            | ItemKind::Phrase { .. }
                            | ItemKind::PhraseSegment { .. }
                    )
            }
            ItemKind::PhraseSegment { .. } => child.is_word_like(),
            ItemKind::Root => !matches!(child, ItemKind::Root),
            _ => self.is_composite(),
        }
    }

    /// Field this item searches, if it searches exactly one
    pub fn index_name(&self) -> Option<&str> {
        match self {
            ItemKind::WeakAnd { index, .. }
            | ItemKind::Phrase { index, .. }
            | ItemKind::PhraseSegment { index, .. } => Some(index),
            ItemKind::SameElement { field } => Some(field),
            ItemKind::Word(t)
            | ItemKind::Prefix(t)
            | ItemKind::Substring(t)
            | ItemKind::Suffix(t)
            | ItemKind::Exact(t) => Some(&t.index),
            ItemKind::Bool(t) => Some(&t.index),
            ItemKind::Int(t) => Some(&t.index),
            ItemKind::RegExp(t) => Some(&t.index),
            ItemKind::Fuzzy(t) => Some(&t.index),
            ItemKind::WordAlternatives(t) => Some(&t.index),
            ItemKind::Location(t) => Some(&t.index),
            ItemKind::GeoLocation(t) => Some(&t.index),
            ItemKind::NearestNeighbor(t) => Some(&t.field),
            ItemKind::PredicateQuery(t) => Some(&t.index),
            ItemKind::WeightedSet(t) | ItemKind::DotProduct(t) => Some(&t.index),
            ItemKind::Wand(t) => Some(&t.set.index),
            ItemKind::StringIn(t) => Some(&t.index),
            ItemKind::NumericIn(t) => Some(&t.index),
            ItemKind::MultiRange(t) => Some(&t.start_index),
            _ => None,
        }
    }

    /// Set the searched field. Returns false for kinds without one.
    pub fn set_index_name(&mut self, name: &str) -> bool {
        let slot = match self {
            ItemKind::WeakAnd { index, .. }
            | ItemKind::Phrase { index, .. }
            | ItemKind::PhraseSegment { index, .. } => index,
            ItemKind::SameElement { field } => field,
            ItemKind::Word(t)
            | ItemKind::Prefix(t)
            | ItemKind::Substring(t)
            | ItemKind::Suffix(t)
            | ItemKind::Exact(t) => &mut t.index,
            ItemKind::Bool(t) => &mut t.index,
            ItemKind::Int(t) => &mut t.index,
            ItemKind::RegExp(t) => &mut t.index,
            ItemKind::Fuzzy(t) => &mut t.index,
            ItemKind::WordAlternatives(t) => &mut t.index,
            ItemKind::Location(t) => &mut t.index,
            ItemKind::GeoLocation(t) => &mut t.index,
            ItemKind::NearestNeighbor(t) => &mut t.field,
            ItemKind::PredicateQuery(t) => &mut t.index,
            ItemKind::WeightedSet(t) | ItemKind::DotProduct(t) => &mut t.index,
            ItemKind::Wand(t) => &mut t.set.index,
            ItemKind::StringIn(t) => &mut t.index,
            ItemKind::NumericIn(t) => &mut t.index,
            _ => return false,
        };
        *slot = name.to_string();
        true
    }

    /// Text the item matches, for term leaves
    pub fn term_text(&self) -> Option<String> {
        match self {
            ItemKind::Word(t)
            | ItemKind::Prefix(t)
            | ItemKind::Substring(t)
            | ItemKind::Suffix(t)
            | ItemKind::Exact(t) => Some(t.word.clone()),
            ItemKind::Bool(t) => Some(t.word().to_string()),
            ItemKind::Int(t) => Some(t.expression()),
            ItemKind::RegExp(t) => Some(t.pattern().to_string()),
            ItemKind::Fuzzy(t) => Some(t.word.clone()),
            ItemKind::WordAlternatives(t) => t.best().map(|a| a.word.clone()),
            ItemKind::Location(t) => Some(t.location()),
            ItemKind::GeoLocation(t) => Some(format!(
                "({},{},{})",
                t.latitude,
                t.longitude,
                t.radius_meters.unwrap_or(-1.0)
            )),
            ItemKind::PureWeightedString(s) => Some(s.clone()),
            ItemKind::PureWeightedInteger(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A node payload in a [`QueryTree`](crate::query::QueryTree).
///
/// Shared attributes live here; structure (parent, children, connectivity)
/// is owned by the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    kind: ItemKind,
    weight: i32,
    ranked: bool,
    position_data: bool,
    filter: bool,
    from_special_token: bool,
    language: Language,
    pub(crate) unique_id: Option<u32>,
    pub(crate) label: Option<String>,
    pub(crate) significance: Option<f64>,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            weight: DEFAULT_WEIGHT,
            ranked: true,
            position_data: true,
            filter: false,
            from_special_token: false,
            language: Language::Unknown,
            unique_id: None,
            label: None,
            significance: None,
        }
    }

    pub fn and() -> Self {
        Self::new(ItemKind::And)
    }

    pub fn or() -> Self {
        Self::new(ItemKind::Or)
    }

    pub fn not() -> Self {
        Self::new(ItemKind::Not)
    }

    pub fn rank() -> Self {
        Self::new(ItemKind::Rank)
    }

    pub fn equiv() -> Self {
        Self::new(ItemKind::Equiv)
    }

    pub fn near(distance: u32) -> Self {
        Self::new(ItemKind::Near { distance })
    }

    pub fn onear(distance: u32) -> Self {
        Self::new(ItemKind::ONear { distance })
    }

    pub fn weak_and(target_hits: u32, index: impl Into<String>) -> Self {
        Self::new(ItemKind::WeakAnd {
            target_hits,
            index: index.into(),
        })
    }

    pub fn same_element(field: impl Into<String>) -> Self {
        Self::new(ItemKind::SameElement { field: field.into() })
    }

    pub fn phrase(index: impl Into<String>) -> Self {
        Self::new(ItemKind::Phrase {
            index: index.into(),
            explicit: true,
        })
    }

    pub fn segment(index: impl Into<String>, raw_word: impl Into<String>) -> Self {
        Self::new(ItemKind::PhraseSegment {
            index: index.into(),
            raw_word: raw_word.into(),
            explicit: false,
        })
    }

    /// WORD in the default index
    pub fn word(word: impl Into<String>) -> Self {
        Self::word_in("", word)
    }

    pub fn word_in(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(ItemKind::Word(WordTerm::new(index, word)))
    }

    pub fn prefix(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(ItemKind::Prefix(WordTerm::new(index, word)))
    }

    pub fn substring(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(ItemKind::Substring(WordTerm::new(index, word)))
    }

    pub fn suffix(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(ItemKind::Suffix(WordTerm::new(index, word)))
    }

    pub fn exact(index: impl Into<String>, word: impl Into<String>) -> Self {
        Self::new(ItemKind::Exact(WordTerm::new(index, word)))
    }

    pub fn boolean(index: impl Into<String>, value: bool) -> Self {
        Self::new(ItemKind::Bool(BoolTerm {
            index: index.into(),
            value,
        }))
    }

    /// INT from a number or range expression
    pub fn int(index: impl Into<String>, expression: &str) -> Result<Self> {
        Ok(Self::new(ItemKind::Int(IntTerm::parse(index, expression)?)))
    }

    pub fn regexp(index: impl Into<String>, pattern: impl Into<String>) -> Result<Self> {
        Ok(Self::new(ItemKind::RegExp(RegExpTerm::new(index, pattern)?)))
    }

    pub fn fuzzy(term: FuzzyTerm) -> Self {
        Self::new(ItemKind::Fuzzy(term))
    }

    pub fn true_item() -> Self {
        Self::new(ItemKind::True)
    }

    pub fn false_item() -> Self {
        Self::new(ItemKind::False)
    }

    pub fn null() -> Self {
        Self::new(ItemKind::Null)
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_filter(mut self, filter: bool) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_ranked(mut self, ranked: bool) -> Self {
        self.ranked = ranked;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    /// Payload access for the tree, which guards kind-changing edits
    pub(crate) fn kind_mut(&mut self) -> &mut ItemKind {
        &mut self.kind
    }

    pub(crate) fn into_kind(self) -> ItemKind {
        self.kind
    }

    pub fn item_type(&self) -> ItemType {
        self.kind.item_type()
    }

    pub fn is_composite(&self) -> bool {
        self.kind.is_composite()
    }

    pub fn is_taggable(&self) -> bool {
        self.kind.is_taggable()
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: i32) {
        self.weight = weight;
    }

    pub fn is_ranked(&self) -> bool {
        self.ranked
    }

    pub fn set_ranked(&mut self, ranked: bool) {
        self.ranked = ranked;
    }

    pub fn uses_position_data(&self) -> bool {
        self.position_data
    }

    pub fn set_position_data(&mut self, position_data: bool) {
        self.position_data = position_data;
    }

    pub fn is_filter(&self) -> bool {
        self.filter
    }

    pub fn set_filter(&mut self, filter: bool) {
        self.filter = filter;
    }

    pub fn is_from_special_token(&self) -> bool {
        self.from_special_token
    }

    pub fn set_from_special_token(&mut self, special: bool) {
        self.from_special_token = special;
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn unique_id(&self) -> Option<u32> {
        self.unique_id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn significance(&self) -> Option<f64> {
        self.significance
    }

    /// Flags byte as sent to the backend
    pub fn flags(&self) -> ItemFlags {
        let mut flags = ItemFlags::new();
        flags.set(ItemFlags::NO_RANK, !self.ranked);
        flags.set(ItemFlags::SPECIAL_TOKEN, self.from_special_token);
        flags.set(ItemFlags::NO_POSITION_DATA, !self.position_data);
        flags.set(ItemFlags::FILTER, self.filter);
        if let ItemKind::Fuzzy(f) = &self.kind {
            flags.set(ItemFlags::PREFIX_MATCH, f.prefix_match);
        }
        flags
    }

    /// Same kind, field and matched text: the identity used when
    /// deduplicating synonyms and matching rank terms.
    pub fn same_term(&self, other: &Item) -> bool {
        self.item_type() == other.item_type()
            && self.kind.index_name() == other.kind.index_name()
            && match (self.kind.term_text(), other.kind.term_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let item = Item::word("a");
        assert_eq!(item.weight(), DEFAULT_WEIGHT);
        assert!(item.is_ranked());
        assert!(item.uses_position_data());
        assert!(!item.is_filter());
        assert!(item.flags().is_empty());
        assert_eq!(item.unique_id(), None);
    }

    #[test]
    fn test_flags_byte() {
        let mut item = Item::word("a").with_filter(true).with_ranked(false);
        item.set_position_data(false);
        item.set_from_special_token(true);
        assert_eq!(item.flags().0, 0x0F);

        let mut fuzzy = FuzzyTerm::new("f", "abc");
        fuzzy.prefix_match = true;
        assert_eq!(Item::fuzzy(fuzzy).flags().0, ItemFlags::PREFIX_MATCH);
    }

    #[test]
    fn test_classification() {
        assert!(Item::and().is_composite());
        assert!(!Item::word("a").is_composite());
        assert!(Item::word("a").is_taggable());
        assert!(Item::phrase("f").is_taggable());
        assert!(!Item::and().is_taggable());
        assert!(!Item::true_item().is_taggable());
        assert!(Item::or().kind().is_reducible());
        assert!(!Item::equiv().kind().is_reducible());
        assert!(!Item::weak_and(10, "").kind().is_reducible());
        assert!(!Item::same_element("f").kind().is_reducible());
    }

    #[test]
    fn test_child_rules() {
        let equiv = ItemKind::Equiv;
        assert!(equiv.accepts_child(Item::word("a").kind()));
        assert!(equiv.accepts_child(Item::phrase("f").kind()));
        assert!(!equiv.accepts_child(Item::and().kind()));
        assert!(!equiv.accepts_child(Item::prefix("", "a").kind()));
        assert!(!equiv.accepts_child(Item::segment("f", "a-b").kind()));

        let same = ItemKind::SameElement { field: "f".into() };
        assert!(same.accepts_child(Item::word("a").kind()));
        assert!(!same.accepts_child(Item::or().kind()));

        assert!(ItemKind::Root.accepts_child(Item::and().kind()));
        assert!(!ItemKind::Root.accepts_child(&ItemKind::Root));
        assert!(!ItemKind::True.accepts_child(Item::word("a").kind()));
    }

    #[test]
    fn test_same_term() {
        assert!(Item::word_in("f", "a").same_term(&Item::word_in("f", "a").with_weight(5)));
        assert!(!Item::word_in("f", "a").same_term(&Item::word_in("g", "a")));
        assert!(!Item::word_in("f", "a").same_term(&Item::prefix("f", "a")));
        assert!(!Item::and().same_term(&Item::and()));
    }
}
