//! Binary stack encoding of a query tree.
//!
//! Items are written depth first. Each starts with a tag byte: the low five
//! bits hold the type code (31 escapes to a second byte holding `code - 31`),
//! bit 5 announces a weight, bit 6 a unique id and bit 7 a flags byte. The
//! announced fields follow in that order, then the kind's payload. Composites
//! write their arity and operator fields before their children.

use crate::query::error::EncodeError;
use crate::query::item::{DEFAULT_WEIGHT, Item, ItemKind};
use crate::query::range::{Interval, MultiRange};
use crate::query::terms::{Token, WeightedSetTerm};
use crate::query::tree::QueryTree;
use crate::query::types::{ItemFlags, ItemId, ItemType, feature};
use crate::utils::encoding::{
    get_compressed_number, get_compressed_positive, get_f64, get_i64, get_string, get_u64,
    put_compressed_number, put_compressed_positive, put_f64, put_i64, put_string, put_u64,
};
use tracing::trace;

type Result<T> = std::result::Result<T, EncodeError>;

/// Encode the query root of `tree` into `buf`.
/// Returns the number of stack items written.
pub fn encode(tree: &QueryTree, buf: &mut Vec<u8>) -> Result<usize> {
    let root = tree.query_root().ok_or(EncodeError::EmptyTree)?;
    encode_item(tree, root, buf)
}

/// Encode the subtree under `id`. Returns the number of stack items written.
///
/// On error `buf` may hold a partial item and must be discarded.
pub fn encode_item(tree: &QueryTree, id: ItemId, buf: &mut Vec<u8>) -> Result<usize> {
    let start = buf.len();
    let mut encoder = Encoder { tree, buf, count: 0 };
    encoder.item(id)?;
    trace!(items = encoder.count, bytes = encoder.buf.len() - start, "encoded query stack");
    Ok(encoder.count)
}

fn len_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| EncodeError::NumberTooLarge(len as i64))
}

struct Encoder<'a> {
    tree: &'a QueryTree,
    buf: &'a mut Vec<u8>,
    count: usize,
}

impl Encoder<'_> {
    fn item(&mut self, id: ItemId) -> Result<()> {
        let item = self.tree.item(id)?;
        match item.kind() {
            ItemKind::Null | ItemKind::Root => {
                return Err(EncodeError::Unencodable(item.item_type()));
            }
            ItemKind::MultiRange(ranges) => return self.multi_range(item, ranges),
            _ => {}
        }
        self.header(item)?;

        match item.kind() {
            ItemKind::Phrase { index, .. } => {
                let words = self.phrase_words(id);
                self.positive(len_u32(words.len())?)?;
                self.string(index)?;
                for word in words {
                    self.item(word)?;
                }
                return Ok(());
            }
            kind if kind.is_composite() => {
                self.positive(len_u32(self.tree.child_count(id))?)?;
                self.operator_fields(kind)?;
                for &child in self.tree.children(id) {
                    self.item(child)?;
                }
                return Ok(());
            }
            _ => {}
        }

        match item.kind() {
            ItemKind::Word(t)
            | ItemKind::Prefix(t)
            | ItemKind::Substring(t)
            | ItemKind::Suffix(t)
            | ItemKind::Exact(t) => {
                self.string(&t.index)?;
                self.string(&t.word)?;
            }
            ItemKind::Bool(t) => {
                self.string(&t.index)?;
                self.string(t.word())?;
            }
            ItemKind::Int(t) => {
                self.string(&t.index)?;
                self.string(&t.expression())?;
            }
            ItemKind::RegExp(t) => {
                self.string(&t.index)?;
                self.string(t.pattern())?;
            }
            ItemKind::Fuzzy(t) => {
                self.string(&t.index)?;
                self.string(&t.word)?;
                self.positive(t.max_edit_distance)?;
                self.positive(t.prefix_length)?;
            }
            ItemKind::WordAlternatives(t) => {
                self.string(&t.index)?;
                self.positive(len_u32(t.alternatives().len())?)?;
                for alternative in t.alternatives() {
                    let weight = (f64::from(item.weight()) * alternative.exactness).round() as i32;
                    self.synthetic_header(ItemType::PureWeightedString, weight)?;
                    self.string(&alternative.word)?;
                }
            }
            ItemKind::Location(t) => {
                self.string(&t.index)?;
                self.string(&t.location())?;
            }
            ItemKind::GeoLocation(t) => {
                self.string(&t.index)?;
                self.positive(3)?;
                put_f64(t.latitude, self.buf);
                put_f64(t.longitude, self.buf);
                put_f64(t.radius_meters.unwrap_or(-1.0), self.buf);
            }
            ItemKind::NearestNeighbor(t) => {
                self.string(&t.field)?;
                self.string(&t.query_tensor_name)?;
                self.positive(t.target_hits)?;
                self.positive(u32::from(t.allow_approximate))?;
                self.positive(t.explore_additional_hits)?;
                put_f64(t.distance_threshold, self.buf);
            }
            ItemKind::PredicateQuery(t) => {
                self.string(&t.index)?;
                self.positive(len_u32(t.features.len())?)?;
                for f in &t.features {
                    self.string(&f.key)?;
                    self.string(&f.value)?;
                    put_u64(f.sub_query_bitmap, self.buf);
                }
                self.positive(len_u32(t.range_features.len())?)?;
                for f in &t.range_features {
                    self.string(&f.key)?;
                    put_i64(f.value, self.buf);
                    put_u64(f.sub_query_bitmap, self.buf);
                }
            }
            ItemKind::WeightedSet(set) | ItemKind::DotProduct(set) => {
                self.positive(len_u32(set.len())?)?;
                self.string(&set.index)?;
                self.weighted_entries(set)?;
            }
            ItemKind::Wand(wand) => {
                self.positive(len_u32(wand.set.len())?)?;
                self.string(&wand.set.index)?;
                self.positive(wand.target_hits)?;
                put_f64(wand.score_threshold, self.buf);
                put_f64(wand.threshold_boost_factor, self.buf);
                self.weighted_entries(&wand.set)?;
            }
            ItemKind::StringIn(t) => {
                self.positive(len_u32(t.tokens().len())?)?;
                self.string(&t.index)?;
                for token in t.tokens() {
                    self.string(token)?;
                }
            }
            ItemKind::NumericIn(t) => {
                self.positive(len_u32(t.values().len())?)?;
                self.string(&t.index)?;
                for &value in t.values() {
                    put_i64(value, self.buf);
                }
            }
            ItemKind::PureWeightedString(s) => self.string(s)?,
            ItemKind::PureWeightedInteger(n) => put_i64(*n, self.buf),
            _ => {}
        }
        Ok(())
    }

    fn tag(&mut self, item_type: ItemType, features: u8) -> Result<()> {
        let code = item_type.code().ok_or(EncodeError::Unencodable(item_type))?;
        if code >= feature::CODE_MASK {
            self.buf.push(feature::CODE_MASK | features);
            self.buf.push(code - feature::CODE_MASK);
        } else {
            self.buf.push(code | features);
        }
        self.count += 1;
        Ok(())
    }

    fn header(&mut self, item: &Item) -> Result<()> {
        self.header_as(item, item.item_type())
    }

    /// Header carrying `item`'s attributes under the code of `item_type`
    fn header_as(&mut self, item: &Item, item_type: ItemType) -> Result<()> {
        let flags = item.flags();
        let mut features = 0;
        if item.weight() != DEFAULT_WEIGHT {
            features |= feature::WEIGHT;
        }
        if item.unique_id().is_some() {
            features |= feature::UNIQUE_ID;
        }
        if !flags.is_empty() {
            features |= feature::FLAGS;
        }
        self.tag(item_type, features)?;
        if item.weight() != DEFAULT_WEIGHT {
            put_compressed_number(item.weight(), self.buf)?;
        }
        if let Some(uid) = item.unique_id() {
            self.positive(uid)?;
        }
        if !flags.is_empty() {
            self.buf.push(flags.0);
        }
        Ok(())
    }

    /// Header of an item generated during encoding, which has no id or flags
    fn synthetic_header(&mut self, item_type: ItemType, weight: i32) -> Result<()> {
        if weight == DEFAULT_WEIGHT {
            return self.tag(item_type, 0);
        }
        self.tag(item_type, feature::WEIGHT)?;
        put_compressed_number(weight, self.buf)
    }

    fn operator_fields(&mut self, kind: &ItemKind) -> Result<()> {
        match kind {
            ItemKind::Near { distance } | ItemKind::ONear { distance } => self.positive(*distance),
            ItemKind::WeakAnd { target_hits, index } => {
                self.positive(*target_hits)?;
                self.string(index)
            }
            ItemKind::SameElement { field } => self.string(field),
            ItemKind::PhraseSegment { index, .. } => self.string(index),
            _ => Ok(()),
        }
    }

    /// Words of a phrase, with the words of its segments inlined
    fn phrase_words(&self, phrase: ItemId) -> Vec<ItemId> {
        let mut words = Vec::new();
        for &child in self.tree.children(phrase) {
            if self.tree.item_type(child) == Some(ItemType::PhraseSegment) {
                words.extend_from_slice(self.tree.children(child));
            } else {
                words.push(child);
            }
        }
        words
    }

    fn weighted_entries(&mut self, set: &WeightedSetTerm) -> Result<()> {
        for entry in set.entries() {
            match &entry.token {
                Token::String(s) => {
                    self.synthetic_header(ItemType::PureWeightedString, entry.weight)?;
                    self.string(s)?;
                }
                Token::Integer(n) => {
                    self.synthetic_header(ItemType::PureWeightedInteger, entry.weight)?;
                    put_i64(*n, self.buf);
                }
            }
        }
        Ok(())
    }

    /// A multi-range goes out as an OR of INT ranges; a single range needs no OR
    fn multi_range(&mut self, item: &Item, ranges: &MultiRange) -> Result<()> {
        let intervals = ranges.merged();
        if intervals.len() != 1 {
            self.header_as(item, ItemType::Or)?;
            self.positive(len_u32(intervals.len())?)?;
        }
        for (i, interval) in intervals.iter().enumerate() {
            let lead = (intervals.len() == 1 && i == 0).then_some(item);
            self.interval(lead, ranges, interval)?;
        }
        Ok(())
    }

    fn interval(&mut self, lead: Option<&Item>, ranges: &MultiRange, interval: &Interval) -> Result<()> {
        if ranges.is_single_field() {
            self.int_header(lead, &ranges.start_index)?;
            return self.string(&ranges.interval_expression(interval));
        }
        // document interval [s, e] overlaps [a, b] when s <= b and e >= a
        match lead {
            Some(item) => self.header_as(item, ItemType::And)?,
            None => self.tag(ItemType::And, 0)?,
        }
        self.positive(2)?;
        let below = format!(
            "[;{}{}",
            ranges.format_value(interval.end),
            if ranges.end_inclusive { ']' } else { '>' }
        );
        self.int_header(None, &ranges.start_index)?;
        self.string(&below)?;
        let above = format!(
            "{}{};]",
            if ranges.start_inclusive { '[' } else { '<' },
            ranges.format_value(interval.start)
        );
        self.int_header(None, &ranges.end_index)?;
        self.string(&above)
    }

    fn int_header(&mut self, lead: Option<&Item>, index: &str) -> Result<()> {
        match lead {
            Some(item) => self.header_as(item, ItemType::Int)?,
            None => self.tag(ItemType::Int, 0)?,
        }
        self.string(index)
    }

    fn positive(&mut self, value: u32) -> Result<()> {
        put_compressed_positive(value, self.buf)
    }

    fn string(&mut self, value: &str) -> Result<()> {
        put_string(value, self.buf)
    }
}

/// Decoded tag byte and the fields it announces
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub code: u8,
    /// `None` for codes this build does not know
    pub item_type: Option<ItemType>,
    pub weight: i32,
    pub unique_id: Option<u32>,
    pub flags: ItemFlags,
}

/// Reads primitives and item headers back from an encoded stack
#[derive(Debug, Clone)]
pub struct StackReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StackReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    fn rest(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or_default()
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.rest().first()?;
        self.pos += 1;
        Some(byte)
    }

    pub fn read_header(&mut self) -> Option<Header> {
        let tag = self.read_byte()?;
        let mut code = tag & feature::CODE_MASK;
        if code == feature::CODE_MASK {
            code = code.checked_add(self.read_byte()?)?;
        }
        let weight = if tag & feature::WEIGHT != 0 {
            self.read_number()?
        } else {
            DEFAULT_WEIGHT
        };
        let unique_id = if tag & feature::UNIQUE_ID != 0 {
            Some(self.read_positive()?)
        } else {
            None
        };
        let flags = if tag & feature::FLAGS != 0 {
            ItemFlags(self.read_byte()?)
        } else {
            ItemFlags::new()
        };
        Some(Header {
            code,
            item_type: ItemType::from_code(code),
            weight,
            unique_id,
            flags,
        })
    }

    pub fn read_positive(&mut self) -> Option<u32> {
        let (value, consumed) = get_compressed_positive(self.rest())?;
        self.pos += consumed;
        Some(value)
    }

    pub fn read_number(&mut self) -> Option<i32> {
        let (value, consumed) = get_compressed_number(self.rest())?;
        self.pos += consumed;
        Some(value)
    }

    pub fn read_string(&mut self) -> Option<&'a str> {
        let (value, consumed) = get_string(self.rest())?;
        self.pos += consumed;
        Some(value)
    }

    pub fn read_i64(&mut self) -> Option<i64> {
        let value = get_i64(self.rest())?;
        self.pos += 8;
        Some(value)
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        let value = get_u64(self.rest())?;
        self.pos += 8;
        Some(value)
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        let value = get_f64(self.rest())?;
        self.pos += 8;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::range::NumberType;
    use crate::query::terms::{
        FuzzyTerm, GeoLocationTerm, LocationTerm, NearestNeighborTerm, NumericInTerm, PredicateQueryTerm,
        StringInTerm, WandTerm, WordAlternatives,
    };

    fn encoded(tree: &QueryTree) -> (Vec<u8>, usize) {
        let mut buf = Vec::new();
        let count = encode(tree, &mut buf).unwrap();
        (buf, count)
    }

    fn single(item: Item) -> (Vec<u8>, usize) {
        encoded(&QueryTree::with_root(item).unwrap())
    }

    #[test]
    fn test_default_word_layout() {
        let (buf, count) = single(Item::word_in("f", "ab"));
        assert_eq!(buf, vec![0x04, 1, b'f', 2, b'a', b'b']);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_header_fields_in_order() {
        let mut tree = QueryTree::new();
        let word = tree.create(Item::word_in("", "a").with_weight(150).with_filter(true));
        tree.set_query_root(word).unwrap();
        tree.set_label(word, "w").unwrap();
        let (buf, _) = encoded(&tree);
        // tag, weight, unique id, flags, index, word
        assert_eq!(buf, vec![0x04 | 0xE0, 0x40, 150, 1, 0x08, 0, 1, b'a']);

        let mut reader = StackReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(header.item_type, Some(ItemType::Word));
        assert_eq!(header.weight, 150);
        assert_eq!(header.unique_id, Some(1));
        assert!(header.flags.contains(ItemFlags::FILTER));
        assert_eq!(reader.read_string(), Some(""));
        assert_eq!(reader.read_string(), Some("a"));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_negative_weight() {
        let (buf, _) = single(Item::word("a").with_weight(-5));
        assert_eq!(&buf[..2], &[0x24, 0x85]);
    }

    #[test]
    fn test_composite_arity_then_children() {
        let mut tree = QueryTree::new();
        let and = tree.create(Item::and());
        tree.set_query_root(and).unwrap();
        for w in ["a", "b"] {
            let id = tree.create(Item::word(w));
            tree.add(and, id).unwrap();
        }
        let (buf, count) = encoded(&tree);
        assert_eq!(buf, vec![0x01, 2, 0x04, 0, 1, b'a', 0x04, 0, 1, b'b']);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_operator_fields() {
        let mut tree = QueryTree::new();
        let near = tree.create(Item::near(3));
        tree.set_query_root(near).unwrap();
        let a = tree.create(Item::word("a"));
        tree.add(near, a).unwrap();
        let (buf, _) = encoded(&tree);
        assert_eq!(&buf[..3], &[11, 1, 3]);

        let mut tree = QueryTree::new();
        let weak = tree.create(Item::weak_and(100, "f"));
        tree.set_query_root(weak).unwrap();
        let a = tree.create(Item::word("a"));
        tree.add(weak, a).unwrap();
        let (buf, _) = encoded(&tree);
        assert_eq!(&buf[..5], &[16, 1, 100, 1, b'f']);

        let mut tree = QueryTree::new();
        let same = tree.create(Item::same_element("f"));
        tree.set_query_root(same).unwrap();
        let a = tree.create(Item::word_in("x", "a"));
        tree.add(same, a).unwrap();
        let (buf, _) = encoded(&tree);
        assert_eq!(&buf[..4], &[18, 1, 1, b'f']);
    }

    #[test]
    fn test_phrase_inlines_segment_words() {
        let mut tree = QueryTree::new();
        let phrase = tree.create(Item::phrase("f"));
        tree.set_query_root(phrase).unwrap();
        let x = tree.create(Item::word("x"));
        tree.add(phrase, x).unwrap();
        let segment = tree.create(Item::segment("f", "y-z"));
        for w in ["y", "z"] {
            let id = tree.create(Item::word(w));
            tree.add(segment, id).unwrap();
        }
        tree.add(phrase, segment).unwrap();

        let (buf, count) = encoded(&tree);
        assert_eq!(count, 4);
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Phrase));
        assert_eq!(reader.read_positive(), Some(3));
        assert_eq!(reader.read_string(), Some("f"));
        for expected in ["x", "y", "z"] {
            assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Word));
            assert_eq!(reader.read_string(), Some("f"));
            assert_eq!(reader.read_string(), Some(expected));
        }
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_extended_codes() {
        let mut strings = StringInTerm::new("f");
        strings.add("a");
        let (buf, _) = single(Item::new(ItemKind::StringIn(strings)));
        assert_eq!(buf, vec![31, 0, 1, 1, b'f', 1, b'a']);

        let mut numbers = NumericInTerm::new("f");
        numbers.add(7);
        let (buf, _) = single(Item::new(ItemKind::NumericIn(numbers)));
        assert_eq!(&buf[..5], &[31, 1, 1, 1, b'f']);
        assert_eq!(get_i64(&buf[5..]), Some(7));
    }

    #[test]
    fn test_fuzzy_prefix_flag() {
        let mut fuzzy = FuzzyTerm::new("f", "ab");
        fuzzy.prefix_match = true;
        fuzzy.prefix_length = 1;
        let (buf, _) = single(Item::fuzzy(fuzzy));
        assert_eq!(buf, vec![30 | 0x80, 0x10, 1, b'f', 2, b'a', b'b', 2, 1]);
    }

    #[test]
    fn test_word_alternatives_scale_weight() {
        let mut alternatives = WordAlternatives::new("f");
        alternatives.add("a", 1.0);
        alternatives.add("b", 0.5);
        let (buf, count) = single(Item::new(ItemKind::WordAlternatives(alternatives)));
        assert_eq!(buf, vec![25, 1, b'f', 2, 19, 1, b'a', 19 | 0x20, 50, 1, b'b']);
        assert_eq!(count, 3);
    }

    #[test]
    fn test_wand_layout() {
        let mut wand = WandTerm::new("tags", 10);
        wand.set.add_token(Token::String("a".into()), 3);
        let (buf, count) = single(Item::new(ItemKind::Wand(wand)));
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Wand));
        assert_eq!(reader.read_positive(), Some(1));
        assert_eq!(reader.read_string(), Some("tags"));
        assert_eq!(reader.read_positive(), Some(10));
        assert_eq!(reader.read_f64(), Some(0.0));
        assert_eq!(reader.read_f64(), Some(1.0));
        let entry = reader.read_header().unwrap();
        assert_eq!(entry.item_type, Some(ItemType::PureWeightedString));
        assert_eq!(entry.weight, 3);
        assert_eq!(reader.read_string(), Some("a"));
        assert!(reader.is_at_end());
        assert_eq!(count, 2);
    }

    #[test]
    fn test_geo_location_layout() {
        let geo = GeoLocationTerm {
            index: "pos".into(),
            latitude: 63.4,
            longitude: 10.4,
            radius_meters: None,
        };
        let (buf, _) = single(Item::new(ItemKind::GeoLocation(geo)));
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().code, 27);
        assert_eq!(reader.read_string(), Some("pos"));
        assert_eq!(reader.read_positive(), Some(3));
        assert_eq!(reader.read_f64(), Some(63.4));
        assert_eq!(reader.read_f64(), Some(10.4));
        assert_eq!(reader.read_f64(), Some(-1.0));
    }

    #[test]
    fn test_int_keeps_expression_text() {
        let (buf, _) = single(Item::int("n", "[1.50;10>").unwrap());
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Int));
        assert_eq!(reader.read_string(), Some("n"));
        assert_eq!(reader.read_string(), Some("[1.50;10>"));
    }

    #[test]
    fn test_multi_range_as_or_of_ints() {
        let mut ranges = MultiRange::new(NumberType::Integer, "n", true, true);
        ranges.add(5.0, 7.0).unwrap();
        ranges.add(1.0, 3.0).unwrap();
        let (buf, count) = single(Item::new(ItemKind::MultiRange(ranges)));
        assert_eq!(count, 3);
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Or));
        assert_eq!(reader.read_positive(), Some(2));
        for expected in ["[1;3]", "[5;7]"] {
            assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::Int));
            assert_eq!(reader.read_string(), Some("n"));
            assert_eq!(reader.read_string(), Some(expected));
        }
    }

    #[test]
    fn test_multi_range_over_field_pair() {
        let mut ranges = MultiRange::between(NumberType::Integer, "from", true, "to", false);
        ranges.add(2.0, 4.0).unwrap();
        let (buf, count) = single(Item::new(ItemKind::MultiRange(ranges)));
        assert_eq!(count, 3);
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::And));
        assert_eq!(reader.read_positive(), Some(2));
        reader.read_header().unwrap();
        assert_eq!(reader.read_string(), Some("from"));
        assert_eq!(reader.read_string(), Some("[;4>"));
        reader.read_header().unwrap();
        assert_eq!(reader.read_string(), Some("to"));
        assert_eq!(reader.read_string(), Some("[2;]"));
    }

    #[test]
    fn test_placeholders_are_rejected() {
        let tree = QueryTree::with_root(Item::null()).unwrap();
        let mut buf = Vec::new();
        assert_eq!(encode(&tree, &mut buf), Err(EncodeError::Unencodable(ItemType::Null)));
        assert_eq!(encode(&QueryTree::new(), &mut buf), Err(EncodeError::EmptyTree));
    }

    /// Tree with `parent` as query root holding one WORD per entry of `words`
    fn composite(parent: Item, words: &[&str]) -> QueryTree {
        let mut tree = QueryTree::new();
        let id = tree.create(parent);
        tree.set_query_root(id).unwrap();
        for w in words {
            let child = tree.create(Item::word(*w));
            tree.add(id, child).unwrap();
        }
        tree
    }

    #[test]
    fn test_not_rank_equiv_onear_layout() {
        let (buf, count) = encoded(&composite(Item::rank(), &["a", "b"]));
        assert_eq!(buf, vec![3, 2, 4, 0, 1, b'a', 4, 0, 1, b'b']);
        assert_eq!(count, 3);

        let (buf, _) = encoded(&composite(Item::equiv(), &["a", "b"]));
        assert_eq!(buf, vec![14, 2, 4, 0, 1, b'a', 4, 0, 1, b'b']);

        // arity, then distance
        let (buf, _) = encoded(&composite(Item::onear(5), &["a", "b"]));
        assert_eq!(buf, vec![12, 2, 5, 4, 0, 1, b'a', 4, 0, 1, b'b']);

        // the TRUE sentinel goes out as the positive branch
        let (buf, count) = encoded(&composite(Item::not(), &["b"]));
        assert_eq!(buf, vec![2, 2, 28, 4, 0, 1, b'b']);
        assert_eq!(count, 3);

        let mut tree = composite(Item::not(), &["b"]);
        let not = tree.query_root().unwrap();
        let a = tree.create(Item::word("a"));
        tree.set_positive(not, a).unwrap();
        let (buf, _) = encoded(&tree);
        assert_eq!(buf, vec![2, 2, 4, 0, 1, b'a', 4, 0, 1, b'b']);
    }

    #[test]
    fn test_bool_goes_out_as_word() {
        let (buf, _) = single(Item::boolean("f", true));
        assert_eq!(buf, vec![4, 1, b'f', 4, b't', b'r', b'u', b'e']);

        let (buf, _) = single(Item::boolean("f", false));
        let mut reader = StackReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(header.code, 4);
        assert_eq!(header.item_type, Some(ItemType::Word));
        assert_eq!(reader.read_string(), Some("f"));
        assert_eq!(reader.read_string(), Some("false"));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_regexp_layout() {
        let (buf, count) = single(Item::regexp("f", "a.b").unwrap());
        assert_eq!(buf, vec![24, 1, b'f', 3, b'a', b'.', b'b']);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_location_layout() {
        let location = LocationTerm {
            index: "pos".into(),
            x: 1,
            y: 2,
            radius: 3,
            aspect: 0,
        };
        let (buf, _) = single(Item::new(ItemKind::Location(location)));
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::LocationTerm));
        assert_eq!(reader.read_string(), Some("pos"));
        assert_eq!(reader.read_string(), Some("(2,1,2,3,0,1,0,0)"));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_nearest_neighbor_layout() {
        let mut nn = NearestNeighborTerm::new("embedding", "q");
        nn.target_hits = 10;
        nn.explore_additional_hits = 5;
        let (buf, count) = single(Item::new(ItemKind::NearestNeighbor(nn)));
        assert_eq!(count, 1);
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().item_type, Some(ItemType::NearestNeighbor));
        assert_eq!(reader.read_string(), Some("embedding"));
        assert_eq!(reader.read_string(), Some("q"));
        assert_eq!(reader.read_positive(), Some(10));
        assert_eq!(reader.read_positive(), Some(1));
        assert_eq!(reader.read_positive(), Some(5));
        assert_eq!(reader.read_f64(), Some(f64::INFINITY));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_predicate_query_layout() {
        let mut predicate = PredicateQueryTerm::new("p");
        predicate.add_feature("gender", "female", PredicateQueryTerm::ALL_SUB_QUERIES);
        predicate.add_range_feature("age", 30, 0x3);
        let (buf, _) = single(Item::new(ItemKind::PredicateQuery(predicate)));
        let mut reader = StackReader::new(&buf);
        assert_eq!(reader.read_header().unwrap().code, 23);
        assert_eq!(reader.read_string(), Some("p"));
        assert_eq!(reader.read_positive(), Some(1));
        assert_eq!(reader.read_string(), Some("gender"));
        assert_eq!(reader.read_string(), Some("female"));
        assert_eq!(reader.read_u64(), Some(u64::MAX));
        assert_eq!(reader.read_positive(), Some(1));
        assert_eq!(reader.read_string(), Some("age"));
        assert_eq!(reader.read_i64(), Some(30));
        assert_eq!(reader.read_u64(), Some(0x3));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_weighted_set_and_dot_product_layout() {
        let mut set = WeightedSetTerm::new("tags");
        set.add_token(Token::String("a".into()), 10);
        set.add_token(Token::Integer(7), -2);

        for (kind, code) in [(ItemKind::WeightedSet(set.clone()), 15u8), (ItemKind::DotProduct(set), 21)] {
            let (buf, count) = single(Item::new(kind));
            assert_eq!(count, 3);
            let mut reader = StackReader::new(&buf);
            assert_eq!(reader.read_header().unwrap().code, code);
            assert_eq!(reader.read_positive(), Some(2));
            assert_eq!(reader.read_string(), Some("tags"));

            let first = reader.read_header().unwrap();
            assert_eq!(first.item_type, Some(ItemType::PureWeightedString));
            assert_eq!(first.weight, 10);
            assert_eq!(reader.read_string(), Some("a"));

            let second = reader.read_header().unwrap();
            assert_eq!(second.item_type, Some(ItemType::PureWeightedInteger));
            assert_eq!(second.weight, -2);
            assert_eq!(reader.read_i64(), Some(7));
            assert!(reader.is_at_end());
        }
    }

    #[test]
    fn test_pure_weighted_items_as_roots() {
        let (buf, _) = single(Item::new(ItemKind::PureWeightedString("x".into())));
        assert_eq!(buf, vec![19, 1, b'x']);

        let (buf, count) = single(Item::new(ItemKind::PureWeightedInteger(5)).with_weight(7));
        assert_eq!(count, 1);
        let mut reader = StackReader::new(&buf);
        let header = reader.read_header().unwrap();
        assert_eq!(header.item_type, Some(ItemType::PureWeightedInteger));
        assert_eq!(header.weight, 7);
        assert_eq!(reader.read_i64(), Some(5));
        assert!(reader.is_at_end());
    }

    #[test]
    fn test_true_false_have_no_payload() {
        assert_eq!(single(Item::true_item()).0, vec![28]);
        assert_eq!(single(Item::false_item()).0, vec![29]);
    }
}
