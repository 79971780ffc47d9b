//! Query item trees: model, canonicalization and backend encoding.
//!
//! A [`QueryTree`] owns every item of one query. Build it with
//! [`QueryTree::create`] and the insertion methods (or from JSON through
//! [`ItemSpec`]), run [`canonicalize`] once, then [`encode`] the result.
//!
//! ```
//! use qtree::query::{canonicalize, encode, Item, QueryTree};
//!
//! let mut tree = QueryTree::new();
//! let and = tree.create(Item::and());
//! tree.set_query_root(and).unwrap();
//! let word = tree.create(Item::word("rust"));
//! tree.add(and, word).unwrap();
//!
//! canonicalize(&mut tree, Some(1000)).unwrap();
//! assert_eq!(tree.to_string(), "rust");
//!
//! let mut buf = Vec::new();
//! assert_eq!(encode(&tree, &mut buf).unwrap(), 1);
//! ```

pub mod builder;
pub mod canonicalizer;
pub mod cursor;
pub mod display;
pub mod encoder;
pub mod error;
pub mod item;
pub mod range;
pub mod terms;
pub mod tree;
pub mod types;

pub use builder::{ConnectSpec, ItemSpec, KindSpec};
pub use canonicalizer::canonicalize;
pub use cursor::ChildCursor;
pub use display::ItemDisplay;
pub use encoder::{encode, encode_item, Header, StackReader};
pub use error::{CanonicalizeError, EncodeError, QueryError};
pub use item::{Item, ItemKind};
pub use range::{IntTerm, Interval, Limit, MultiRange, Number, NumberType};
pub use terms::*;
pub use tree::{Connectivity, LockedSegment, PreOrder, QueryTree};
pub use types::{ItemFlags, ItemId, ItemType, Language};
