//! # qtree - query item trees for search backends
//!
//! qtree models a search query as a tree of typed items (boolean operators,
//! proximity and phrase operators, terms of many kinds), normalizes it and
//! serializes it into the compact stack format a search backend reads.
//!
//! ## Architecture
//!
//! - [`query`] - Item model, tree arena, canonicalizer and binary encoder
//! - [`utils`] - Compressed integer encoding and configuration
//!
//! ## Quick Start
//!
//! ```
//! use qtree::query::{canonicalize, encode, ItemSpec};
//!
//! let spec = ItemSpec::from_json(
//!     r#"{"type": "or", "children": [
//!         {"type": "word", "word": "a"},
//!         {"type": "false"}
//!     ]}"#,
//! ).unwrap();
//! let mut tree = spec.build().unwrap();
//!
//! canonicalize(&mut tree, Some(10_000)).unwrap();
//! assert_eq!(tree.to_string(), "a");
//!
//! let mut payload = Vec::new();
//! let items = encode(&tree, &mut payload).unwrap();
//! assert_eq!(items, 1);
//! ```
//!
//! ## Pipeline
//!
//! 1. **Build** - items are created in a [`query::QueryTree`] and linked under
//!    operators; illegal structure is rejected without touching the tree.
//! 2. **Canonicalize** - a bottom-up pass removes placeholders, propagates
//!    FALSE, collapses redundant levels and enforces the item count limit.
//! 3. **Encode** - the tree is written in pre-order as headers plus
//!    per-kind payloads.

pub mod query;
pub mod utils;
