//! Mutable cursor over the children of one composite.
//!
//! The cursor stores positions, not references, so the tree can be edited
//! through it while a traversal is in progress: the item last returned by
//! [`ChildCursor::next`] can be removed, replaced or spliced away.

use crate::query::error::{QueryError, Result};
use crate::query::tree::QueryTree;
use crate::query::types::ItemId;

#[derive(Debug, Clone)]
pub struct ChildCursor {
    parent: ItemId,
    next: usize,
    last: Option<usize>,
}

impl ChildCursor {
    pub fn new(parent: ItemId) -> Self {
        Self {
            parent,
            next: 0,
            last: None,
        }
    }

    pub fn parent(&self) -> ItemId {
        self.parent
    }

    pub fn next(&mut self, tree: &QueryTree) -> Option<ItemId> {
        let child = tree.child(self.parent, self.next)?;
        self.last = Some(self.next);
        self.next += 1;
        Some(child)
    }

    fn last(&self) -> Result<usize> {
        self.last.ok_or(QueryError::IndexOutOfBounds {
            index: self.next,
            len: 0,
        })
    }

    /// Remove the item last returned by `next`
    pub fn remove(&mut self, tree: &mut QueryTree) -> Result<ItemId> {
        let index = self.last()?;
        let removed = tree.remove(self.parent, index)?;
        self.next = index;
        self.last = None;
        Ok(removed)
    }

    /// Replace the item last returned by `next`, returning it detached
    pub fn set(&mut self, tree: &mut QueryTree, item: ItemId) -> Result<ItemId> {
        let index = self.last()?;
        let width = tree.child_count(self.parent);
        let old = tree.replace(self.parent, index, item)?;
        // a flattened phrase may have taken more than one slot
        self.next = (index + 1 + tree.child_count(self.parent)).saturating_sub(width);
        Ok(old)
    }

    /// Insert before the next item; `next` will not return it
    pub fn add(&mut self, tree: &mut QueryTree, item: ItemId) -> Result<()> {
        let width = tree.child_count(self.parent);
        tree.insert(self.parent, self.next, item)?;
        self.next = (self.next + tree.child_count(self.parent)).saturating_sub(width);
        self.last = None;
        Ok(())
    }

    /// Replace the item last returned by `next` with `items`, in order.
    ///
    /// The spliced items are skipped by the traversal. On error nothing after
    /// the failing item is inserted and the items already placed stay.
    pub fn splice(&mut self, tree: &mut QueryTree, items: &[ItemId]) -> Result<ItemId> {
        let Some((&first, rest)) = items.split_first() else {
            return self.remove(tree);
        };
        let replaced = self.set(tree, first)?;
        for &item in rest {
            self.add(tree, item)?;
        }
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::item::Item;

    fn words(tree: &QueryTree, parent: ItemId) -> Vec<String> {
        tree.children(parent)
            .iter()
            .filter_map(|&c| tree.item(c).ok()?.kind().term_text())
            .collect()
    }

    fn or_of(tree: &mut QueryTree, terms: &[&str]) -> ItemId {
        let or = tree.create(Item::or());
        for t in terms {
            let id = tree.create(Item::word(*t));
            tree.add(or, id).unwrap();
        }
        or
    }

    #[test]
    fn test_remove_during_iteration() {
        let mut tree = QueryTree::new();
        let or = or_of(&mut tree, &["a", "x", "b", "x"]);
        let mut cursor = ChildCursor::new(or);
        let mut seen = Vec::new();
        while let Some(child) = cursor.next(&tree) {
            let text = tree.item(child).unwrap().kind().term_text().unwrap();
            if text == "x" {
                cursor.remove(&mut tree).unwrap();
            } else {
                seen.push(text);
            }
        }
        assert_eq!(seen, vec!["a", "b"]);
        assert_eq!(words(&tree, or), vec!["a", "b"]);
    }

    #[test]
    fn test_set_and_add() {
        let mut tree = QueryTree::new();
        let or = or_of(&mut tree, &["a", "b"]);
        let mut cursor = ChildCursor::new(or);
        cursor.next(&tree).unwrap();
        let c = tree.create(Item::word("c"));
        cursor.set(&mut tree, c).unwrap();
        let d = tree.create(Item::word("d"));
        cursor.add(&mut tree, d).unwrap();
        let next = cursor.next(&tree).unwrap();
        assert_eq!(tree.item(next).unwrap().kind().term_text().as_deref(), Some("b"));
        assert_eq!(words(&tree, or), vec!["c", "d", "b"]);
    }

    #[test]
    fn test_splice_skips_inserted() {
        let mut tree = QueryTree::new();
        let outer = or_of(&mut tree, &["a"]);
        let inner = or_of(&mut tree, &["b", "c"]);
        tree.add(outer, inner).unwrap();
        let tail = tree.create(Item::word("d"));
        tree.add(outer, tail).unwrap();

        let mut cursor = ChildCursor::new(outer);
        cursor.next(&tree).unwrap();
        assert_eq!(cursor.next(&tree), Some(inner));
        let grandchildren = tree.children(inner).to_vec();
        cursor.splice(&mut tree, &grandchildren).unwrap();
        assert_eq!(cursor.next(&tree), Some(tail));
        assert_eq!(cursor.next(&tree), None);
        assert_eq!(words(&tree, outer), vec!["a", "b", "c", "d"]);
        assert_eq!(tree.child_count(inner), 0);
    }

    #[test]
    fn test_edit_without_current_item_fails() {
        let mut tree = QueryTree::new();
        let or = or_of(&mut tree, &["a"]);
        let mut cursor = ChildCursor::new(or);
        assert!(cursor.remove(&mut tree).is_err());
        cursor.next(&tree).unwrap();
        cursor.remove(&mut tree).unwrap();
        assert!(cursor.remove(&mut tree).is_err());
    }
}
