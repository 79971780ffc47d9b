//! Arena-backed query tree.
//!
//! Every item lives in one `Vec` slot addressed by [`ItemId`]. Parent links,
//! child lists and connectivity edges are ids into the same arena, so moving
//! or replacing a subtree never invalidates references held elsewhere.
//! Slot 0 is the root wrapper; it holds at most one child, the query root.
//!
//! Removed items stay in the arena as detached nodes. A [`Clone`] of the tree,
//! or [`QueryTree::compact`], keeps only what is reachable from the root.

use crate::query::error::{QueryError, Result};
use crate::query::item::{Item, ItemKind};
use crate::query::terms::WordTerm;
use crate::query::types::{ItemId, ItemType};
use rustc_hash::FxHashMap;
use tracing::trace;

const ROOT: ItemId = ItemId(0);

/// Weighted edge from one taggable item to another
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Connectivity {
    pub target: ItemId,
    pub weight: f64,
}

#[derive(Debug, Clone)]
struct Node {
    item: Item,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    connectivity: Option<Connectivity>,
    /// Source of the connectivity edge pointing at this node
    backlink: Option<ItemId>,
    locked: bool,
}

impl Node {
    fn new(item: Item) -> Self {
        Self {
            item,
            parent: None,
            children: Vec::new(),
            connectivity: None,
            backlink: None,
            locked: false,
        }
    }
}

/// A query tree and every item created for it.
///
/// Items removed or replaced, and the TRUE sentinels NOT items receive, stay
/// in the arena until [`QueryTree::compact`] or a clone drops them.
#[derive(Debug)]
pub struct QueryTree {
    nodes: Vec<Node>,
    next_unique_id: u32,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(Item::new(ItemKind::Root))],
            next_unique_id: 1,
        }
    }

    /// Tree whose query root is `item`
    pub fn with_root(item: Item) -> Result<Self> {
        let mut tree = Self::new();
        let id = tree.create(item);
        tree.set_query_root(id)?;
        Ok(tree)
    }

    /// The root wrapper
    pub fn root(&self) -> ItemId {
        ROOT
    }

    /// The single item under the root wrapper
    pub fn query_root(&self) -> Option<ItemId> {
        self.nodes[ROOT.index()].children.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.query_root().is_none()
    }

    /// Add a detached item to the arena.
    ///
    /// A NOT is created with a TRUE sentinel as its positive branch.
    pub fn create(&mut self, item: Item) -> ItemId {
        let is_not = matches!(item.kind(), ItemKind::Not);
        let id = self.push(item);
        if is_not {
            let sentinel = self.push(Item::true_item());
            self.nodes[sentinel.index()].parent = Some(id);
            self.nodes[id.index()].children.push(sentinel);
        }
        id
    }

    fn push(&mut self, item: Item) -> ItemId {
        let id = ItemId(self.nodes.len() as u32);
        self.nodes.push(Node::new(item));
        id
    }

    pub fn contains(&self, id: ItemId) -> bool {
        id.index() < self.nodes.len()
    }

    fn node(&self, id: ItemId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(QueryError::NoSuchItem(id))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        Ok(&self.node(id)?.item)
    }

    /// Mutable access to an item's attributes. Fails inside a locked segment.
    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.node(id)?;
        self.check_unlocked(id)?;
        Ok(&mut self.nodes[id.index()].item)
    }

    pub fn item_type(&self, id: ItemId) -> Option<ItemType> {
        self.nodes.get(id.index()).map(|n| n.item.item_type())
    }

    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(id.index())?.parent
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.nodes.get(id.index()).map_or(&[][..], |n| n.children.as_slice())
    }

    pub fn child(&self, id: ItemId, index: usize) -> Option<ItemId> {
        self.children(id).get(index).copied()
    }

    pub fn child_count(&self, id: ItemId) -> usize {
        self.children(id).len()
    }

    /// Whether `id` is reachable from the root wrapper
    pub fn is_attached(&self, id: ItemId) -> bool {
        self.ancestors(id).any(|a| a == ROOT)
    }

    /// `id` followed by its parent, grandparent and so on
    fn ancestors(&self, id: ItemId) -> impl Iterator<Item = ItemId> + '_ {
        std::iter::successors(self.contains(id).then_some(id), move |&cur| self.parent(cur))
    }

    fn locked_ancestor(&self, id: ItemId) -> Option<ItemId> {
        self.ancestors(id).find(|a| self.nodes[a.index()].locked)
    }

    /// Whether `id` is a locked segment or lies inside one
    pub fn is_locked(&self, id: ItemId) -> bool {
        self.locked_ancestor(id).is_some()
    }

    fn check_unlocked(&self, id: ItemId) -> Result<()> {
        match self.locked_ancestor(id) {
            Some(locked) => Err(QueryError::Locked(locked)),
            None => Ok(()),
        }
    }

    /// Whether `parent`'s operator allows `child` as a direct child
    pub fn accepts(&self, parent: ItemId, child: ItemId) -> bool {
        match (self.nodes.get(parent.index()), self.nodes.get(child.index())) {
            (Some(p), Some(c)) => p.item.kind().accepts_child(c.item.kind()),
            _ => false,
        }
    }

    fn validate_insert(&self, parent: ItemId, child: ItemId, replacing: bool) -> Result<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;
        if parent == child {
            return Err(QueryError::SelfInsertion(child));
        }
        let parent_kind = parent_node.item.kind();
        if !parent_kind.is_composite() {
            return Err(QueryError::NotComposite(parent_kind.item_type()));
        }
        if matches!(child_node.item.kind(), ItemKind::Root) {
            return Err(QueryError::RootAsChild);
        }
        if matches!(parent_kind, ItemKind::Root) && !replacing {
            if let Some(&occupant) = parent_node.children.first() {
                return Err(QueryError::RootOccupied(occupant));
            }
        }
        if !parent_kind.accepts_child(child_node.item.kind()) {
            return Err(QueryError::IllegalChild {
                parent: parent_kind.item_type(),
                child: child_node.item.item_type(),
            });
        }
        if self.ancestors(parent).any(|a| a == child) {
            return Err(QueryError::Cycle { parent, child });
        }
        self.check_unlocked(parent)?;
        if let Some(old_parent) = child_node.parent {
            self.check_unlocked(old_parent)?;
        }
        Ok(())
    }

    /// Append `child` to `parent`, moving it from its current parent if any
    pub fn add(&mut self, parent: ItemId, child: ItemId) -> Result<()> {
        let len = self.child_count(parent);
        self.insert(parent, len, child)
    }

    /// Insert `child` at `index`, moving it from its current parent if any.
    ///
    /// Phrases flatten nested phrases into themselves, turn INT children into
    /// words and give every child their own index name. Inserting at the front
    /// of a NOT whose positive branch is the TRUE sentinel replaces the sentinel.
    pub fn insert(&mut self, parent: ItemId, index: usize, child: ItemId) -> Result<()> {
        self.validate_insert(parent, child, false)?;
        let len = self.child_count(parent);
        if index > len {
            return Err(QueryError::IndexOutOfBounds { index, len });
        }
        if index == 0 && self.has_not_sentinel(parent) {
            self.replace(parent, 0, child)?;
            return Ok(());
        }
        let mut index = index;
        if let Some(old_parent) = self.nodes[child.index()].parent {
            let pos = self.position(old_parent, child);
            let reinstated = self.unlink(old_parent, pos);
            if old_parent == parent && pos < index && !reinstated {
                index -= 1;
            }
        }
        self.attach(parent, index, child);
        Ok(())
    }

    /// Whether `parent` is a NOT still waiting for its positive branch
    fn has_not_sentinel(&self, parent: ItemId) -> bool {
        let node = &self.nodes[parent.index()];
        matches!(node.item.kind(), ItemKind::Not)
            && node
                .children
                .first()
                .is_some_and(|c| matches!(self.nodes[c.index()].item.kind(), ItemKind::True))
    }

    /// Replace the positive branch (child 0) of a NOT, or the matching child of a RANK.
    /// Returns the previous child 0.
    pub fn set_positive(&mut self, parent: ItemId, child: ItemId) -> Result<Option<ItemId>> {
        if self.child_count(parent) == 0 {
            self.insert(parent, 0, child)?;
            return Ok(None);
        }
        self.replace(parent, 0, child).map(Some)
    }

    /// Remove and return the child at `index`.
    ///
    /// Removing the positive branch of a NOT leaves a TRUE sentinel in its place.
    pub fn remove(&mut self, parent: ItemId, index: usize) -> Result<ItemId> {
        self.node(parent)?;
        self.check_unlocked(parent)?;
        let len = self.child_count(parent);
        if index >= len {
            return Err(QueryError::IndexOutOfBounds { index, len });
        }
        let child = self.nodes[parent.index()].children[index];
        self.unlink(parent, index);
        self.repair_removed(child);
        Ok(child)
    }

    /// Remove `child` from `parent`. Returns false when it is not a child of `parent`.
    pub fn remove_item(&mut self, parent: ItemId, child: ItemId) -> Result<bool> {
        match self.children(parent).iter().position(|&c| c == child) {
            Some(index) => self.remove(parent, index).map(|_| true),
            None => Ok(false),
        }
    }

    /// Put `child` at `index` in place of the current child, which is returned detached
    pub fn replace(&mut self, parent: ItemId, index: usize, child: ItemId) -> Result<ItemId> {
        self.validate_insert(parent, child, true)?;
        let len = self.child_count(parent);
        if index >= len {
            return Err(QueryError::IndexOutOfBounds { index, len });
        }
        let old = self.nodes[parent.index()].children[index];
        if old == child {
            return Ok(old);
        }
        if let Some(old_parent) = self.nodes[child.index()].parent {
            let pos = self.position(old_parent, child);
            self.unlink(old_parent, pos);
        }
        let pos = self.position(parent, old);
        self.unlink_raw(parent, pos);
        self.attach(parent, pos, child);
        self.repair_replaced(old, child);
        Ok(old)
    }

    /// Make `item` the query root. Returns the previous query root.
    pub fn set_query_root(&mut self, item: ItemId) -> Result<Option<ItemId>> {
        if self.query_root().is_some() {
            self.replace(ROOT, 0, item).map(Some)
        } else {
            self.insert(ROOT, 0, item).map(|_| None)
        }
    }

    /// Combine the query root with `item` under an AND, reusing an AND root
    pub fn and_with(&mut self, item: ItemId) -> Result<ItemId> {
        let node = self.node(item)?;
        if matches!(node.item.kind(), ItemKind::Root) {
            return Err(QueryError::RootAsChild);
        }
        if let Some(old_parent) = node.parent {
            self.check_unlocked(old_parent)?;
        }
        let Some(root) = self.query_root() else {
            self.set_query_root(item)?;
            return Ok(item);
        };
        if root == item {
            return Err(QueryError::SelfInsertion(item));
        }
        match self.nodes[root.index()].item.kind() {
            ItemKind::And => {
                self.add(root, item)?;
                Ok(root)
            }
            ItemKind::Null => {
                self.set_query_root(item)?;
                Ok(item)
            }
            _ => {
                let and = self.create(Item::and());
                self.replace(ROOT, 0, and)?;
                self.add(and, root)?;
                self.add(and, item)?;
                Ok(and)
            }
        }
    }

    /// Replace a reducible composite holding exactly one child by that child.
    ///
    /// The parent's slot is rewritten in place, so positions of siblings do not
    /// change. Returns false when nothing was done.
    pub fn extract_single_child(&mut self, id: ItemId) -> Result<bool> {
        let node = self.node(id)?;
        if node.children.len() != 1 || !node.item.kind().is_reducible() {
            return Ok(false);
        }
        let Some(parent) = node.parent else {
            return Ok(false);
        };
        let child = node.children[0];
        if !self.accepts(parent, child) {
            return Ok(false);
        }
        self.check_unlocked(id)?;
        let pos = self.position(parent, id);
        self.nodes[id.index()].children.clear();
        self.nodes[id.index()].parent = None;
        self.nodes[parent.index()].children[pos] = child;
        self.nodes[child.index()].parent = Some(parent);
        self.repair_replaced(id, child);
        trace!(composite = %id, %child, "extracted single child");
        Ok(true)
    }

    fn position(&self, parent: ItemId, child: ItemId) -> usize {
        self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == child)
            .unwrap_or_default()
    }

    fn unlink_raw(&mut self, parent: ItemId, pos: usize) -> ItemId {
        let child = self.nodes[parent.index()].children.remove(pos);
        let child_node = &mut self.nodes[child.index()];
        if child_node.parent == Some(parent) {
            child_node.parent = None;
        }
        child
    }

    /// Detach the child at `pos`. Returns true when a NOT sentinel took its place.
    fn unlink(&mut self, parent: ItemId, pos: usize) -> bool {
        self.unlink_raw(parent, pos);
        if pos == 0 && matches!(self.nodes[parent.index()].item.kind(), ItemKind::Not) {
            let sentinel = self.push(Item::true_item());
            self.nodes[sentinel.index()].parent = Some(parent);
            self.nodes[parent.index()].children.insert(0, sentinel);
            return true;
        }
        false
    }

    /// Link a detached `child` under `parent`; returns how many children were added
    fn attach(&mut self, parent: ItemId, index: usize, child: ItemId) -> usize {
        let phrase_index = match self.nodes[parent.index()].item.kind() {
            ItemKind::Phrase { index, .. } | ItemKind::PhraseSegment { index, .. } => Some(index.clone()),
            _ => None,
        };
        if let Some(phrase_index) = phrase_index {
            if matches!(self.nodes[child.index()].item.kind(), ItemKind::Phrase { .. }) {
                let words = std::mem::take(&mut self.nodes[child.index()].children);
                let mut added = 0;
                for word in words {
                    self.nodes[word.index()].parent = None;
                    added += self.attach(parent, index + added, word);
                }
                self.repair_removed(child);
                return added;
            }
            let number = match self.nodes[child.index()].item.kind() {
                ItemKind::Int(term) => Some(term.expression()),
                _ => None,
            };
            let kind = self.nodes[child.index()].item.kind_mut();
            if let Some(number) = number {
                *kind = ItemKind::Word(WordTerm::new(phrase_index.as_str(), number));
            }
            kind.set_index_name(&phrase_index);
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.insert(index, child);
        1
    }

    /// Set the searched field of an item; phrases pass it on to their words
    pub fn set_index_name(&mut self, id: ItemId, name: &str) -> Result<bool> {
        self.node(id)?;
        self.check_unlocked(id)?;
        if !self.nodes[id.index()].item.kind_mut().set_index_name(name) {
            return Ok(false);
        }
        if matches!(
            self.nodes[id.index()].item.kind(),
            ItemKind::Phrase { .. } | ItemKind::PhraseSegment { .. }
        ) {
            for child in self.nodes[id.index()].children.clone() {
                self.set_index_name(child, name)?;
            }
        }
        Ok(true)
    }

    pub fn connectivity(&self, id: ItemId) -> Option<Connectivity> {
        self.nodes.get(id.index())?.connectivity
    }

    pub fn connected_backlink(&self, id: ItemId) -> Option<ItemId> {
        self.nodes.get(id.index())?.backlink
    }

    /// Connect `from` to `to` with a weight in `[0, 1]`.
    ///
    /// Both items get unique ids. `to` has a single backlink: an earlier edge
    /// into it is dropped.
    pub fn set_connectivity(&mut self, from: ItemId, to: ItemId, weight: f64) -> Result<()> {
        for id in [from, to] {
            let item = &self.node(id)?.item;
            if !item.is_taggable() {
                return Err(QueryError::NotTaggable(item.item_type()));
            }
        }
        if from == to {
            return Err(QueryError::SelfInsertion(from));
        }
        if !(0.0..=1.0).contains(&weight) {
            return Err(QueryError::InvalidConnectivity(weight));
        }
        self.check_unlocked(from)?;
        self.disconnect(from);
        if let Some(previous) = self.nodes[to.index()].backlink.take() {
            self.nodes[previous.index()].connectivity = None;
        }
        self.nodes[from.index()].connectivity = Some(Connectivity { target: to, weight });
        self.nodes[to.index()].backlink = Some(from);
        self.assign_unique_id(from);
        self.assign_unique_id(to);
        Ok(())
    }

    pub fn clear_connectivity(&mut self, from: ItemId) -> Result<()> {
        self.node(from)?;
        self.check_unlocked(from)?;
        self.disconnect(from);
        Ok(())
    }

    fn disconnect(&mut self, from: ItemId) {
        if let Some(edge) = self.nodes[from.index()].connectivity.take() {
            let target = &mut self.nodes[edge.target.index()];
            if target.backlink == Some(from) {
                target.backlink = None;
            }
        }
    }

    /// A removed target hands its own edge over to whoever pointed at it
    fn repair_removed(&mut self, removed: ItemId) {
        let Some(source) = self.nodes[removed.index()].backlink.take() else {
            return;
        };
        let onward = self.nodes[removed.index()].connectivity;
        self.disconnect(removed);
        self.nodes[source.index()].connectivity = None;
        if let Some(edge) = onward.filter(|e| e.target != source) {
            if let Some(previous) = self.nodes[edge.target.index()].backlink.replace(source) {
                if previous != source {
                    self.nodes[previous.index()].connectivity = None;
                }
            }
            self.nodes[source.index()].connectivity = Some(edge);
            trace!(%removed, %source, target = %edge.target, "reconnected past removed item");
        }
    }

    fn repair_replaced(&mut self, old: ItemId, new: ItemId) {
        let Some(source) = self.nodes[old.index()].backlink else {
            return;
        };
        if !self.nodes[new.index()].item.is_taggable() || new == source {
            self.repair_removed(old);
            return;
        }
        self.nodes[old.index()].backlink = None;
        if let Some(edge) = self.nodes[source.index()].connectivity.as_mut() {
            edge.target = new;
        }
        if let Some(previous) = self.nodes[new.index()].backlink.replace(source) {
            if previous != source {
                self.nodes[previous.index()].connectivity = None;
            }
        }
        self.assign_unique_id(new);
    }

    fn assign_unique_id(&mut self, id: ItemId) -> u32 {
        let item = &mut self.nodes[id.index()].item;
        match item.unique_id {
            Some(uid) => uid,
            None => {
                let uid = self.next_unique_id;
                self.next_unique_id += 1;
                item.unique_id = Some(uid);
                uid
            }
        }
    }

    /// Unique id of `id`, assigning the next free one if it has none
    pub fn ensure_unique_id(&mut self, id: ItemId) -> Result<u32> {
        self.node(id)?;
        Ok(self.assign_unique_id(id))
    }

    pub fn set_label(&mut self, id: ItemId, label: impl Into<String>) -> Result<()> {
        let item = &self.node(id)?.item;
        if matches!(item.kind(), ItemKind::Root) {
            return Err(QueryError::NotTaggable(ItemType::Root));
        }
        self.check_unlocked(id)?;
        self.nodes[id.index()].item.label = Some(label.into());
        self.assign_unique_id(id);
        Ok(())
    }

    /// First attached item in pre-order carrying `label`
    pub fn find_label(&self, label: &str) -> Option<ItemId> {
        self.pre_order(ROOT)
            .find(|&id| self.nodes[id.index()].item.label() == Some(label))
    }

    pub fn set_significance(&mut self, id: ItemId, significance: f64) -> Result<()> {
        let item = &self.node(id)?.item;
        if !item.is_taggable() {
            return Err(QueryError::NotTaggable(item.item_type()));
        }
        self.check_unlocked(id)?;
        self.nodes[id.index()].item.significance = Some(significance);
        self.assign_unique_id(id);
        Ok(())
    }

    /// Freeze a phrase segment. Later edits of the segment or its words fail.
    pub fn lock_segment(&mut self, id: ItemId) -> Result<LockedSegment<'_>> {
        let item = &self.node(id)?.item;
        if !matches!(item.kind(), ItemKind::PhraseSegment { .. }) {
            return Err(QueryError::NotSegment(item.item_type()));
        }
        self.nodes[id.index()].locked = true;
        Ok(LockedSegment { tree: self, id })
    }

    /// Read-only view of an already locked segment
    pub fn locked_segment(&self, id: ItemId) -> Option<LockedSegment<'_>> {
        let node = self.nodes.get(id.index())?;
        node.locked.then_some(LockedSegment { tree: self, id })
    }

    /// Depth-first, parents before children
    pub fn pre_order(&self, from: ItemId) -> PreOrder<'_> {
        let stack = if self.contains(from) { vec![from] } else { Vec::new() };
        PreOrder { tree: self, stack }
    }

    /// Number of items under the root wrapper, the wrapper excluded
    pub fn tree_size(&self) -> usize {
        self.query_root().map_or(0, |root| self.pre_order(root).count())
    }

    /// Term leaves of the query in pre-order
    pub fn terms(&self) -> Vec<ItemId> {
        self.pre_order(ROOT)
            .filter(|&id| self.nodes[id.index()].item.kind().is_term())
            .collect()
    }

    /// Drop every item not reachable from the root.
    ///
    /// Items are renumbered: ids taken before compacting must not be used after.
    pub fn compact(&mut self) {
        let before = self.nodes.len();
        *self = self.clone();
        trace!(before, after = self.nodes.len(), "compacted query tree");
    }

    /// Matched text of a phrase or segment: its words in order, space separated.
    /// None for other items, or when a child has no term text.
    pub fn phrase_text(&self, id: ItemId) -> Option<String> {
        let node = self.nodes.get(id.index())?;
        if !matches!(node.item.kind(), ItemKind::Phrase { .. } | ItemKind::PhraseSegment { .. }) {
            return None;
        }
        let words = node
            .children
            .iter()
            .map(|&c| match self.nodes[c.index()].item.kind() {
                ItemKind::PhraseSegment { .. } => self.phrase_text(c),
                kind => kind.term_text(),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(words.join(" "))
    }

    /// Copy the subtree under `id` into a new tree, as its query root
    pub fn subtree(&self, id: ItemId) -> Result<QueryTree> {
        let item = &self.node(id)?.item;
        if matches!(item.kind(), ItemKind::Root) {
            return Ok(self.clone());
        }
        let mut copy = QueryTree::new();
        let top = self.copy_into(id, &mut copy);
        copy.nodes[top.index()].parent = Some(ROOT);
        copy.nodes[ROOT.index()].children.push(top);
        Ok(copy)
    }

    /// Append a copy of the subtree under `from` to `target`, keeping unique ids
    /// and edges whose both ends are copied. Returns the copy of `from`.
    fn copy_into(&self, from: ItemId, target: &mut QueryTree) -> ItemId {
        let order: Vec<ItemId> = self.pre_order(from).collect();
        let base = target.nodes.len() as u32;
        let mapping: FxHashMap<ItemId, ItemId> = order
            .iter()
            .enumerate()
            .map(|(i, &old)| (old, ItemId(base + i as u32)))
            .collect();

        for &old in &order {
            let node = &self.nodes[old.index()];
            let mut copy = Node::new(node.item.clone());
            copy.parent = node.parent.and_then(|p| mapping.get(&p).copied());
            copy.children = node.children.iter().filter_map(|c| mapping.get(c).copied()).collect();
            copy.locked = node.locked;
            target.nodes.push(copy);
        }
        // edges can only be wired once every endpoint has its new id
        for &old in &order {
            let Some(edge) = self.nodes[old.index()].connectivity else {
                continue;
            };
            if let (Some(&from), Some(&to)) = (mapping.get(&old), mapping.get(&edge.target)) {
                target.nodes[from.index()].connectivity = Some(Connectivity {
                    target: to,
                    weight: edge.weight,
                });
                target.nodes[to.index()].backlink = Some(from);
            }
        }
        target.next_unique_id = target.next_unique_id.max(self.next_unique_id);
        mapping.get(&from).copied().unwrap_or(ROOT)
    }

    fn subtree_eq(&self, a: ItemId, other: &QueryTree, b: ItemId) -> bool {
        let (na, nb) = (&self.nodes[a.index()], &other.nodes[b.index()]);
        let edge_target = |tree: &QueryTree, edge: Option<Connectivity>| {
            edge.map(|e| (tree.nodes[e.target.index()].item.unique_id, e.weight))
        };
        na.item == nb.item
            && na.locked == nb.locked
            && edge_target(self, na.connectivity) == edge_target(other, nb.connectivity)
            && na.children.len() == nb.children.len()
            && na
                .children
                .iter()
                .zip(&nb.children)
                .all(|(&ca, &cb)| self.subtree_eq(ca, other, cb))
    }
}

impl Clone for QueryTree {
    /// Compacting copy: detached items are dropped and ids are renumbered, so
    /// ids of `self` must not be used with the copy.
    fn clone(&self) -> Self {
        let mut copy = QueryTree {
            nodes: Vec::with_capacity(self.nodes.len()),
            next_unique_id: self.next_unique_id,
        };
        self.copy_into(ROOT, &mut copy);
        copy
    }
}

/// Structural equality of the attached trees: items, shape and connectivity
impl PartialEq for QueryTree {
    fn eq(&self, other: &Self) -> bool {
        self.subtree_eq(ROOT, other, ROOT)
    }
}

pub struct PreOrder<'a> {
    tree: &'a QueryTree,
    stack: Vec<ItemId>,
}

impl Iterator for PreOrder<'_> {
    type Item = ItemId;

    fn next(&mut self) -> Option<ItemId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.children(id).iter().rev());
        Some(id)
    }
}

/// Read-only view of a locked phrase segment
#[derive(Debug, Clone, Copy)]
pub struct LockedSegment<'a> {
    tree: &'a QueryTree,
    id: ItemId,
}

impl<'a> LockedSegment<'a> {
    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn item(&self) -> &'a Item {
        &self.tree.nodes[self.id.index()].item
    }

    /// The word as written before segmentation
    pub fn raw_word(&self) -> &'a str {
        match self.item().kind() {
            ItemKind::PhraseSegment { raw_word, .. } => raw_word,
            _ => "",
        }
    }

    pub fn words(&self) -> impl Iterator<Item = &'a Item> + 'a {
        let tree = self.tree;
        tree.children(self.id).iter().map(move |c| &tree.nodes[c.index()].item)
    }

    pub fn len(&self) -> usize {
        self.tree.child_count(self.id)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
