//! Text form of query items, for logs and the CLI.
//!
//! Composites print as their operator name followed by their children, with
//! nested composites in parentheses: `AND a (OR b c)`. NOT prints as
//! `+positive -negative`, phrases as `index:"a b"` and same-element as
//! `field:{a b}`. A non-default weight is appended as `!weight`.

use crate::query::item::{DEFAULT_WEIGHT, Item, ItemKind};
use crate::query::tree::QueryTree;
use crate::query::types::ItemId;
use std::fmt::{self, Write};

/// Displays the subtree under one item
pub struct ItemDisplay<'a> {
    tree: &'a QueryTree,
    id: ItemId,
}

impl QueryTree {
    pub fn display(&self, id: ItemId) -> ItemDisplay<'_> {
        ItemDisplay { tree: self, id }
    }
}

impl fmt::Display for ItemDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_item(f, self.tree, self.id, false)
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query_root() {
            Some(root) => write_item(f, self, root, false),
            None => Ok(()),
        }
    }
}

fn qualified(f: &mut fmt::Formatter<'_>, index: &str) -> fmt::Result {
    if index.is_empty() {
        Ok(())
    } else {
        write!(f, "{}:", index)
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, tree: &QueryTree, id: ItemId, separator: &str) -> fmt::Result {
    for (i, &child) in tree.children(id).iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write_item(f, tree, child, true)?;
    }
    Ok(())
}

fn write_item(f: &mut fmt::Formatter<'_>, tree: &QueryTree, id: ItemId, nested: bool) -> fmt::Result {
    let Ok(item) = tree.item(id) else {
        return write!(f, "<missing {}>", id);
    };
    let kind = item.kind();

    match kind {
        ItemKind::Root => {
            return match tree.child(id, 0) {
                Some(root) => write_item(f, tree, root, false),
                None => Ok(()),
            };
        }
        ItemKind::Phrase { index, .. } => {
            qualified(f, index)?;
            f.write_char('"')?;
            write_words(f, tree, id)?;
            f.write_char('"')?;
            return write_weight(f, item);
        }
        ItemKind::PhraseSegment { index, .. } => {
            qualified(f, index)?;
            f.write_char('\'')?;
            write_words(f, tree, id)?;
            f.write_char('\'')?;
            return write_weight(f, item);
        }
        ItemKind::SameElement { field } => {
            qualified(f, field)?;
            f.write_char('{')?;
            write_children(f, tree, id, " ")?;
            f.write_char('}')?;
            return write_weight(f, item);
        }
        _ => {}
    }

    if kind.is_composite() {
        if nested {
            f.write_char('(')?;
        }
        if let ItemKind::Not = kind {
            for (i, &child) in tree.children(id).iter().enumerate() {
                if i > 0 {
                    f.write_char(' ')?;
                }
                f.write_char(if i == 0 { '+' } else { '-' })?;
                write_item(f, tree, child, true)?;
            }
        } else {
            match kind {
                ItemKind::Near { distance } | ItemKind::ONear { distance } => {
                    write!(f, "{}({})", item.item_type(), distance)?
                }
                ItemKind::WeakAnd { target_hits, .. } => write!(f, "WEAKAND({})", target_hits)?,
                _ => write!(f, "{}", item.item_type())?,
            }
            if tree.child_count(id) > 0 {
                f.write_char(' ')?;
            }
            write_children(f, tree, id, " ")?;
        }
        if nested {
            f.write_char(')')?;
        }
        return Ok(());
    }

    write_leaf(f, item)?;
    write_weight(f, item)
}

/// Words of a phrase or segment, without their index names
fn write_words(f: &mut fmt::Formatter<'_>, tree: &QueryTree, id: ItemId) -> fmt::Result {
    for (i, &child) in tree.children(id).iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }
        match tree.item(child).map(|c| c.kind()) {
            Ok(ItemKind::PhraseSegment { .. }) => write_words(f, tree, child)?,
            Ok(kind) => f.write_str(&kind.term_text().unwrap_or_default())?,
            Err(_) => write!(f, "<missing {}>", child)?,
        }
    }
    Ok(())
}

fn write_weight(f: &mut fmt::Formatter<'_>, item: &Item) -> fmt::Result {
    if item.weight() != DEFAULT_WEIGHT {
        write!(f, "!{}", item.weight())?;
    }
    Ok(())
}

fn write_leaf(f: &mut fmt::Formatter<'_>, item: &Item) -> fmt::Result {
    match item.kind() {
        ItemKind::Word(t) | ItemKind::Exact(t) => {
            qualified(f, &t.index)?;
            f.write_str(&t.word)
        }
        ItemKind::Prefix(t) => {
            qualified(f, &t.index)?;
            write!(f, "{}*", t.word)
        }
        ItemKind::Substring(t) => {
            qualified(f, &t.index)?;
            write!(f, "*{}*", t.word)
        }
        ItemKind::Suffix(t) => {
            qualified(f, &t.index)?;
            write!(f, "*{}", t.word)
        }
        ItemKind::Bool(t) => {
            qualified(f, &t.index)?;
            f.write_str(t.word())
        }
        ItemKind::Int(t) => {
            qualified(f, &t.index)?;
            f.write_str(&t.expression())
        }
        ItemKind::RegExp(t) => {
            qualified(f, &t.index)?;
            write!(f, "/{}/", t.pattern())
        }
        ItemKind::Fuzzy(t) => {
            qualified(f, &t.index)?;
            write!(f, "{}~{}", t.word, t.max_edit_distance)
        }
        ItemKind::WordAlternatives(t) => {
            qualified(f, &t.index)?;
            f.write_char('[')?;
            for (i, a) in t.alternatives().iter().enumerate() {
                if i > 0 {
                    f.write_char(' ')?;
                }
                write!(f, "{}({})", a.word, a.exactness)?;
            }
            f.write_char(']')
        }
        ItemKind::Location(t) => {
            qualified(f, &t.index)?;
            f.write_str(&t.location())
        }
        ItemKind::GeoLocation(t) => {
            qualified(f, &t.index)?;
            match t.radius_meters {
                Some(radius) => write!(f, "({},{},{}m)", t.latitude, t.longitude, radius),
                None => write!(f, "({},{})", t.latitude, t.longitude),
            }
        }
        ItemKind::NearestNeighbor(t) => write!(
            f,
            "NEAREST_NEIGHBOR({},{},{})",
            t.field, t.query_tensor_name, t.target_hits
        ),
        ItemKind::PredicateQuery(t) => {
            write!(f, "PREDICATE_QUERY_ITEM {}{{", t.index)?;
            let features = t.features.iter().map(|p| format!("{}={}", p.key, p.value));
            let ranges = t.range_features.iter().map(|p| format!("{}={}", p.key, p.value));
            f.write_str(&features.chain(ranges).collect::<Vec<_>>().join(","))?;
            f.write_char('}')
        }
        ItemKind::WeightedSet(set) | ItemKind::DotProduct(set) => {
            write!(f, "{} {}", item.item_type(), set.index)?;
            write_entries(f, set)
        }
        ItemKind::Wand(wand) => {
            write!(
                f,
                "WAND({},{},{}) {}",
                wand.target_hits, wand.score_threshold, wand.threshold_boost_factor, wand.set.index
            )?;
            write_entries(f, &wand.set)
        }
        ItemKind::StringIn(t) => {
            write!(f, "STRING_IN {}{{", t.index)?;
            f.write_str(&t.tokens().join(","))?;
            f.write_char('}')
        }
        ItemKind::NumericIn(t) => {
            write!(f, "NUMERIC_IN {}{{", t.index)?;
            let values: Vec<String> = t.values().iter().map(|v| v.to_string()).collect();
            f.write_str(&values.join(","))?;
            f.write_char('}')
        }
        ItemKind::PureWeightedString(s) => f.write_str(s),
        ItemKind::PureWeightedInteger(n) => write!(f, "{}", n),
        ItemKind::MultiRange(ranges) => {
            write!(f, "MULTI_RANGE {}", ranges.start_index)?;
            if !ranges.is_single_field() {
                write!(f, ",{}", ranges.end_index)?;
            }
            let intervals: Vec<String> = ranges
                .merged()
                .iter()
                .map(|i| ranges.interval_expression(i))
                .collect();
            write!(f, "{{{}}}", intervals.join(","))
        }
        other => f.write_str(other.item_type().name()),
    }
}

fn write_entries(f: &mut fmt::Formatter<'_>, set: &crate::query::terms::WeightedSetTerm) -> fmt::Result {
    f.write_char('{')?;
    for (i, entry) in set.entries().iter().enumerate() {
        if i > 0 {
            f.write_char(',')?;
        }
        write!(f, "[{}]:\"{}\"", entry.weight, entry.token)?;
    }
    f.write_char('}')
}
