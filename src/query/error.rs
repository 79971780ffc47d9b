//! Error types for building, canonicalizing and encoding query trees

use crate::query::types::{ItemId, ItemType};
use thiserror::Error;

/// Construction-time rejections.
///
/// An operation that fails with one of these leaves the tree untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The id does not name a live node of this tree
    #[error("No such item: {0}")]
    NoSuchItem(ItemId),

    #[error("Cannot add {0} to itself")]
    SelfInsertion(ItemId),

    /// Inserting would make an item its own ancestor
    #[error("Cannot add {child} to {parent}: {child} is an ancestor of {parent}")]
    Cycle { parent: ItemId, child: ItemId },

    #[error("A root item cannot be added as a child")]
    RootAsChild,

    /// The root wrapper holds exactly one query item
    #[error("The root already holds {0}; a query tree has a single root item")]
    RootOccupied(ItemId),

    #[error("{0} is not a composite item")]
    NotComposite(ItemType),

    /// Operator-specific child legality rule violated
    #[error("Cannot add {child} to {parent}")]
    IllegalChild { parent: ItemType, child: ItemType },

    #[error("Index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{0} is not a phrase segment")]
    NotSegment(ItemType),

    #[error("{0} is locked and cannot be modified")]
    Locked(ItemId),

    #[error("{0} cannot carry connectivity, unique ids or significance")]
    NotTaggable(ItemType),

    #[error("Connectivity weight must be in [0, 1], got {0}")]
    InvalidConnectivity(f64),

    #[error("Invalid numeric range '{expression}': {reason}")]
    InvalidRange { expression: String, reason: String },

    #[error("Invalid regular expression '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Builder input referred to a label no item carries
    #[error("Unknown label: {0}")]
    UnknownLabel(String),
}

/// Terminal canonicalization failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalizeError {
    #[error("No query")]
    NoQuery,

    #[error("Query tree exceeds allowed item count. Configured limit: {limit} - Item count: {count}")]
    TooManyItems { limit: u32, count: usize },

    /// A rewrite was refused by the tree; the input broke a tree invariant
    #[error(transparent)]
    Tree(#[from] QueryError),
}

/// Encoding failures. These signal a defect in an earlier stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A placeholder reached the encoder
    #[error("{0} items have no wire representation")]
    Unencodable(ItemType),

    #[error("Number {0} is outside the compressed integer range")]
    NumberTooLarge(i64),

    #[error("Cannot encode an empty query tree")]
    EmptyTree,

    #[error(transparent)]
    Tree(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, QueryError>;
