use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a node inside one [`QueryTree`](crate::query::QueryTree) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub(crate) u32);

impl ItemId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw arena slot, useful for diagnostics
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Concrete item variant.
///
/// The numeric codes returned by [`ItemType::code`] are shared with the backend's
/// query stack parser. Never renumber an existing code; new kinds get new codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    Or,
    And,
    Not,
    Rank,
    Word,
    Int,
    Phrase,
    PhraseSegment,
    Prefix,
    Substring,
    LocationTerm,
    Near,
    ONear,
    Suffix,
    Equiv,
    WeightedSet,
    WeakAnd,
    Exact,
    SameElement,
    PureWeightedString,
    PureWeightedInteger,
    DotProduct,
    Wand,
    PredicateQuery,
    RegExp,
    WordAlternatives,
    NearestNeighbor,
    GeoLocationTerm,
    True,
    False,
    Fuzzy,
    StringIn,
    NumericIn,
    Bool,
    MultiRange,
    Null,
    Root,
}

impl ItemType {
    /// Wire code, or `None` for kinds the backend never sees directly
    pub fn code(self) -> Option<u8> {
        let code = match self {
            ItemType::Or => 0,
            ItemType::And => 1,
            ItemType::Not => 2,
            ItemType::Rank => 3,
            ItemType::Word | ItemType::Bool => 4,
            ItemType::Int => 5,
            ItemType::Phrase | ItemType::PhraseSegment => 6,
            // 7 is reserved for the abstract multi-term code
            ItemType::Prefix => 8,
            ItemType::Substring => 9,
            ItemType::LocationTerm => 10,
            ItemType::Near => 11,
            ItemType::ONear => 12,
            ItemType::Suffix => 13,
            ItemType::Equiv => 14,
            ItemType::WeightedSet => 15,
            ItemType::WeakAnd => 16,
            ItemType::Exact => 17,
            ItemType::SameElement => 18,
            ItemType::PureWeightedString => 19,
            ItemType::PureWeightedInteger => 20,
            ItemType::DotProduct => 21,
            ItemType::Wand => 22,
            ItemType::PredicateQuery => 23,
            ItemType::RegExp => 24,
            ItemType::WordAlternatives => 25,
            ItemType::NearestNeighbor => 26,
            ItemType::GeoLocationTerm => 27,
            ItemType::True => 28,
            ItemType::False => 29,
            ItemType::Fuzzy => 30,
            ItemType::StringIn => 31,
            ItemType::NumericIn => 32,
            ItemType::MultiRange | ItemType::Null | ItemType::Root => return None,
        };
        Some(code)
    }

    /// Operator name used in the textual form of composites
    pub fn name(self) -> &'static str {
        match self {
            ItemType::Or => "OR",
            ItemType::And => "AND",
            ItemType::Not => "NOT",
            ItemType::Rank => "RANK",
            ItemType::Word => "WORD",
            ItemType::Int => "INT",
            ItemType::Phrase => "PHRASE",
            ItemType::PhraseSegment => "SEGMENT",
            ItemType::Prefix => "PREFIX",
            ItemType::Substring => "SUBSTRING",
            ItemType::LocationTerm => "LOCATION",
            ItemType::Near => "NEAR",
            ItemType::ONear => "ONEAR",
            ItemType::Suffix => "SUFFIX",
            ItemType::Equiv => "EQUIV",
            ItemType::WeightedSet => "WEIGHTEDSET",
            ItemType::WeakAnd => "WEAKAND",
            ItemType::Exact => "EXACT",
            ItemType::SameElement => "SAME_ELEMENT",
            ItemType::PureWeightedString => "PURE_WEIGHTED_STRING",
            ItemType::PureWeightedInteger => "PURE_WEIGHTED_INTEGER",
            ItemType::DotProduct => "DOTPRODUCT",
            ItemType::Wand => "WAND",
            ItemType::PredicateQuery => "PREDICATE_QUERY_ITEM",
            ItemType::RegExp => "REGEXP",
            ItemType::WordAlternatives => "WORD_ALTERNATIVES",
            ItemType::NearestNeighbor => "NEAREST_NEIGHBOR",
            ItemType::GeoLocationTerm => "GEO_LOCATION",
            ItemType::True => "TRUE",
            ItemType::False => "FALSE",
            ItemType::Fuzzy => "FUZZY",
            ItemType::StringIn => "STRING_IN",
            ItemType::NumericIn => "NUMERIC_IN",
            ItemType::Bool => "BOOL",
            ItemType::MultiRange => "MULTI_RANGE",
            ItemType::Null => "NULL",
            ItemType::Root => "ROOT",
        }
    }

    /// Look up the item type for a wire code.
    ///
    /// Shared codes resolve to their primary kind (`4` is `Word`, `6` is `Phrase`).
    pub fn from_code(code: u8) -> Option<Self> {
        let item_type = match code {
            0 => ItemType::Or,
            1 => ItemType::And,
            2 => ItemType::Not,
            3 => ItemType::Rank,
            4 => ItemType::Word,
            5 => ItemType::Int,
            6 => ItemType::Phrase,
            8 => ItemType::Prefix,
            9 => ItemType::Substring,
            10 => ItemType::LocationTerm,
            11 => ItemType::Near,
            12 => ItemType::ONear,
            13 => ItemType::Suffix,
            14 => ItemType::Equiv,
            15 => ItemType::WeightedSet,
            16 => ItemType::WeakAnd,
            17 => ItemType::Exact,
            18 => ItemType::SameElement,
            19 => ItemType::PureWeightedString,
            20 => ItemType::PureWeightedInteger,
            21 => ItemType::DotProduct,
            22 => ItemType::Wand,
            23 => ItemType::PredicateQuery,
            24 => ItemType::RegExp,
            25 => ItemType::WordAlternatives,
            26 => ItemType::NearestNeighbor,
            27 => ItemType::GeoLocationTerm,
            28 => ItemType::True,
            29 => ItemType::False,
            30 => ItemType::Fuzzy,
            31 => ItemType::StringIn,
            32 => ItemType::NumericIn,
            _ => return None,
        };
        Some(item_type)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-item flags byte as written on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags(pub u8);

impl ItemFlags {
    pub const NONE: u8 = 0;
    pub const NO_RANK: u8 = 1 << 0;
    pub const SPECIAL_TOKEN: u8 = 1 << 1;
    pub const NO_POSITION_DATA: u8 = 1 << 2;
    pub const FILTER: u8 = 1 << 3;
    pub const PREFIX_MATCH: u8 = 1 << 4;

    pub fn new() -> Self {
        Self(Self::NONE)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == Self::NONE
    }

    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }

    pub fn set(&mut self, flag: u8, on: bool) {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}

/// Feature bits in the tag byte
pub(crate) mod feature {
    pub const CODE_MASK: u8 = 0x1F;
    pub const WEIGHT: u8 = 0x20;
    pub const UNIQUE_ID: u8 = 0x40;
    pub const FLAGS: u8 = 0x80;
}

/// Language tag of the text an item was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Unknown,
    English,
    German,
    French,
    Spanish,
    Italian,
    Portuguese,
    Dutch,
    Norwegian,
    Swedish,
    Danish,
    Finnish,
    Polish,
    Russian,
    Turkish,
    Arabic,
    Hebrew,
    Chinese,
    Japanese,
    Korean,
}

impl Language {
    /// Parse an ISO 639-1 code, falling back to `Unknown`
    pub fn from_code(code: &str) -> Self {
        match code.to_ascii_lowercase().as_str() {
            "en" => Language::English,
            "de" => Language::German,
            "fr" => Language::French,
            "es" => Language::Spanish,
            "it" => Language::Italian,
            "pt" => Language::Portuguese,
            "nl" => Language::Dutch,
            "nb" | "nn" | "no" => Language::Norwegian,
            "sv" => Language::Swedish,
            "da" => Language::Danish,
            "fi" => Language::Finnish,
            "pl" => Language::Polish,
            "ru" => Language::Russian,
            "tr" => Language::Turkish,
            "ar" => Language::Arabic,
            "he" => Language::Hebrew,
            "zh" | "zh-hans" | "zh-hant" => Language::Chinese,
            "ja" => Language::Japanese,
            "ko" => Language::Korean,
            _ => Language::Unknown,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Unknown => "un",
            Language::English => "en",
            Language::German => "de",
            Language::French => "fr",
            Language::Spanish => "es",
            Language::Italian => "it",
            Language::Portuguese => "pt",
            Language::Dutch => "nl",
            Language::Norwegian => "nb",
            Language::Swedish => "sv",
            Language::Danish => "da",
            Language::Finnish => "fi",
            Language::Polish => "pl",
            Language::Russian => "ru",
            Language::Turkish => "tr",
            Language::Arabic => "ar",
            Language::Hebrew => "he",
            Language::Chinese => "zh",
            Language::Japanese => "ja",
            Language::Korean => "ko",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ItemType::Or.code(), Some(0));
        assert_eq!(ItemType::Word.code(), Some(4));
        assert_eq!(ItemType::SameElement.code(), Some(18));
        assert_eq!(ItemType::Fuzzy.code(), Some(30));
        assert_eq!(ItemType::StringIn.code(), Some(31));
        assert_eq!(ItemType::NumericIn.code(), Some(32));
        assert_eq!(ItemType::Null.code(), None);
        assert_eq!(ItemType::Root.code(), None);
    }

    #[test]
    fn test_code_lookup_roundtrip() {
        for code in 0..=32u8 {
            match ItemType::from_code(code) {
                Some(item_type) => assert_eq!(item_type.code(), Some(code)),
                None => assert_eq!(code, 7),
            }
        }
        assert_eq!(ItemType::from_code(33), None);
    }

    #[test]
    fn test_flags() {
        let mut flags = ItemFlags::new();
        assert!(flags.is_empty());
        flags.set(ItemFlags::FILTER, true);
        flags.set(ItemFlags::NO_RANK, true);
        assert_eq!(flags.0, 0x09);
        flags.set(ItemFlags::NO_RANK, false);
        assert!(flags.contains(ItemFlags::FILTER));
        assert!(!flags.contains(ItemFlags::NO_RANK));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("EN"), Language::English);
        assert_eq!(Language::from_code("xx"), Language::Unknown);
        assert_eq!(Language::default().code(), "un");
    }
}
