//! Utility functions shared by the library and the CLI.
//!
//! ## Modules
//!
//! - [`app_data`] - Configuration file location and loading
//! - [`encoding`] - Compressed integers and primitive fields of the backend stack format
//!
//! ```
//! use qtree::utils::{get_compressed_positive, put_compressed_positive};
//!
//! let mut buf = Vec::new();
//! put_compressed_positive(300, &mut buf).unwrap();
//! assert_eq!(buf, [0x81, 0x2C]);
//! assert_eq!(get_compressed_positive(&buf), Some((300, 2)));
//! ```

pub mod app_data;
pub mod encoding;

pub use app_data::*;
pub use encoding::*;
