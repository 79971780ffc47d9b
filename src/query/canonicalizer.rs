//! Bottom-up rewrite pass run on every query tree before it is encoded.
//!
//! Children are canonicalized before their parent, and each composite then
//! goes through these steps in order:
//!
//! 1. NULL children are dropped
//! 2. FALSE is propagated (AND becomes FALSE, OR drops it, NOT/RANK become
//!    FALSE only when their first child is FALSE)
//! 3. children of the same operator are spliced into the parent
//! 4. EQUIV drops repeated synonyms
//! 5. RANK stops ranking matching-branch terms that the ranking branches repeat
//! 6. empty composites are removed
//! 7. reducible composites with a single child are replaced by it
//!
//! Locked segments are left exactly as they are.

use crate::query::cursor::ChildCursor;
use crate::query::error::CanonicalizeError;
use crate::query::item::{Item, ItemKind};
use crate::query::tree::QueryTree;
use crate::query::types::{ItemId, ItemType};
use rustc_hash::FxHashSet;
use tracing::{debug, trace, warn};

type Result<T> = std::result::Result<T, CanonicalizeError>;

/// Canonicalize `tree` in place.
///
/// Fails when nothing is left to search for or when the result has more
/// items than `max_item_count` allows. The tree must not be encoded after a
/// failure.
pub fn canonicalize(tree: &mut QueryTree, max_item_count: Option<u32>) -> Result<()> {
    let mut canonicalizer = Canonicalizer {
        tree: &mut *tree,
        rewrites: 0,
    };
    canonicalizer.run()?;
    let rewrites = canonicalizer.rewrites;

    if tree.is_empty() {
        debug!(rewrites, "query tree canonicalized away");
        return Err(CanonicalizeError::NoQuery);
    }
    let count = tree.tree_size();
    if let Some(limit) = max_item_count {
        if count > limit as usize {
            warn!(limit, count, "query tree exceeds allowed item count");
            return Err(CanonicalizeError::TooManyItems { limit, count });
        }
    }
    debug!(items = count, rewrites, "canonicalized query tree");
    Ok(())
}

/// Identity of a term for rank-term matching and synonym dedup: kind, field
/// and matched text.
///
/// Weight and flags are not part of it, so a down-weighted or filtered copy
/// in a ranking branch still takes over the ranking of the matching term.
type TermKey = (ItemType, String, String);

fn term_key(item: &Item) -> Option<TermKey> {
    let kind = item.kind();
    if !kind.is_term() {
        return None;
    }
    Some((
        item.item_type(),
        kind.index_name().unwrap_or_default().to_string(),
        kind.term_text()?,
    ))
}

struct Canonicalizer<'a> {
    tree: &'a mut QueryTree,
    rewrites: usize,
}

impl Canonicalizer<'_> {
    fn run(&mut self) -> Result<()> {
        let mut cursor = ChildCursor::new(self.tree.root());
        while let Some(child) = cursor.next(self.tree) {
            self.visit(child, &mut cursor)?;
        }
        Ok(())
    }

    fn item_type(&self, id: ItemId) -> Option<ItemType> {
        self.tree.item_type(id)
    }

    fn visit(&mut self, id: ItemId, parent: &mut ChildCursor) -> Result<()> {
        if self.tree.is_locked(id) {
            return Ok(());
        }
        let kind = self.tree.item(id)?.kind();
        let removal = match kind {
            ItemKind::Null => Some("removed null item"),
            ItemKind::MultiRange(ranges) if ranges.is_empty() => Some("removed empty multi-range"),
            _ => None,
        };
        let composite = kind.is_composite();
        if let Some(what) = removal {
            parent.remove(self.tree)?;
            self.rewrote(id, what);
        } else if composite {
            self.visit_composite(id, parent)?;
        }
        Ok(())
    }

    fn visit_composite(&mut self, id: ItemId, parent: &mut ChildCursor) -> Result<()> {
        let mut cursor = ChildCursor::new(id);
        while let Some(child) = cursor.next(self.tree) {
            self.visit(child, &mut cursor)?;
        }

        if self.propagate_false(id, parent)? {
            return Ok(());
        }
        self.collapse_levels(id)?;
        match self.item_type(id) {
            Some(ItemType::Equiv) => self.remove_duplicate_synonyms(id)?,
            Some(ItemType::Rank) => self.reduce_rank_cost(id)?,
            _ => {}
        }

        match self.tree.child_count(id) {
            0 => {
                parent.remove(self.tree)?;
                self.rewrote(id, "removed empty composite");
            }
            1 => {
                if self.tree.extract_single_child(id)? {
                    self.rewrote(id, "replaced composite by its only child");
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns true when `id` itself was replaced by FALSE
    fn propagate_false(&mut self, id: ItemId, parent: &mut ChildCursor) -> Result<bool> {
        let first_only = match self.item_type(id) {
            Some(ItemType::And) => {
                if self.tree.children(id).iter().any(|&c| self.is_false(c)) {
                    self.replace_with_false(parent)?;
                    self.rewrote(id, "AND with a FALSE child became FALSE");
                    return Ok(true);
                }
                return Ok(false);
            }
            Some(ItemType::Or) => false,
            Some(ItemType::Not | ItemType::Rank) => true,
            _ => return Ok(false),
        };

        let mut cursor = ChildCursor::new(id);
        if first_only {
            match cursor.next(self.tree) {
                Some(first) if self.is_false(first) => {
                    self.replace_with_false(parent)?;
                    self.rewrote(id, "first child is FALSE, composite became FALSE");
                    return Ok(true);
                }
                _ => {}
            }
        }
        while let Some(child) = cursor.next(self.tree) {
            if self.is_false(child) {
                cursor.remove(self.tree)?;
                self.rewrote(child, "removed FALSE child");
            }
        }
        Ok(false)
    }

    fn is_false(&self, id: ItemId) -> bool {
        self.item_type(id) == Some(ItemType::False)
    }

    fn replace_with_false(&mut self, parent: &mut ChildCursor) -> Result<()> {
        let falsehood = self.tree.create(Item::false_item());
        parent.set(self.tree, falsehood)?;
        Ok(())
    }

    fn collapse_levels(&mut self, id: ItemId) -> Result<()> {
        let first_only = match self.item_type(id) {
            Some(ItemType::And | ItemType::Or | ItemType::WeakAnd) => false,
            Some(ItemType::Rank | ItemType::Not) => true,
            _ => return Ok(()),
        };
        let mut cursor = ChildCursor::new(id);
        while let Some(child) = cursor.next(self.tree) {
            if self.same_operator(id, child)? {
                let grandchildren = self.tree.children(child).to_vec();
                cursor.splice(self.tree, &grandchildren)?;
                self.rewrote(child, "collapsed into parent of the same operator");
            }
            if first_only {
                break;
            }
        }
        Ok(())
    }

    fn same_operator(&self, parent: ItemId, child: ItemId) -> Result<bool> {
        if self.tree.is_locked(child) {
            return Ok(false);
        }
        let same = match (self.tree.item(parent)?.kind(), self.tree.item(child)?.kind()) {
            (ItemKind::And, ItemKind::And)
            | (ItemKind::Or, ItemKind::Or)
            | (ItemKind::Rank, ItemKind::Rank)
            | (ItemKind::Not, ItemKind::Not) => true,
            (
                ItemKind::WeakAnd { target_hits, index },
                ItemKind::WeakAnd {
                    target_hits: child_hits,
                    index: child_index,
                },
            ) => target_hits == child_hits && index == child_index,
            _ => false,
        };
        Ok(same)
    }

    /// Keep the first of synonyms matching the same text in the same field
    fn remove_duplicate_synonyms(&mut self, id: ItemId) -> Result<()> {
        let mut seen: FxHashSet<TermKey> = FxHashSet::default();
        let mut cursor = ChildCursor::new(id);
        while let Some(child) = cursor.next(self.tree) {
            let Some(key) = self.synonym_key(child)? else {
                continue;
            };
            if seen.contains(&key) {
                cursor.remove(self.tree)?;
                self.rewrote(child, "removed duplicate synonym");
            } else {
                seen.insert(key);
            }
        }
        Ok(())
    }

    /// Phrases key on their words in order, other synonyms on their term text
    fn synonym_key(&self, id: ItemId) -> Result<Option<TermKey>> {
        let item = self.tree.item(id)?;
        let text = match item.kind() {
            ItemKind::Phrase { .. } | ItemKind::PhraseSegment { .. } => self.tree.phrase_text(id),
            kind => kind.term_text(),
        };
        Ok(text.map(|text| {
            (
                item.item_type(),
                item.kind().index_name().unwrap_or_default().to_string(),
                text,
            )
        }))
    }

    /// Terms of the matching branch that also occur in a ranking branch are
    /// ranked through that occurrence; matching them needs no rank or positions.
    fn reduce_rank_cost(&mut self, id: ItemId) -> Result<()> {
        let children = self.tree.children(id).to_vec();
        let Some((&matching, ranking)) = children.split_first() else {
            return Ok(());
        };
        let mut ranked_terms: FxHashSet<TermKey> = FxHashSet::default();
        for &branch in ranking {
            for term in self.tree.pre_order(branch) {
                if let Some(key) = term_key(self.tree.item(term)?) {
                    ranked_terms.insert(key);
                }
            }
        }
        if ranked_terms.is_empty() {
            return Ok(());
        }

        let candidates: Vec<ItemId> = self
            .tree
            .pre_order(matching)
            .filter(|&t| !self.tree.is_locked(t))
            .collect();
        for term in candidates {
            let matches = term_key(self.tree.item(term)?).is_some_and(|key| ranked_terms.contains(&key));
            if matches {
                let item = self.tree.item_mut(term)?;
                item.set_ranked(false);
                item.set_position_data(false);
                self.rewrote(term, "term ranked by a ranking branch");
            }
        }
        Ok(())
    }

    fn rewrote(&mut self, id: ItemId, what: &'static str) {
        self.rewrites += 1;
        trace!(item = %id, "{}", what);
    }
}
