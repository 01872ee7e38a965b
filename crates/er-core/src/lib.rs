//! # Entity Resolution Core (`er-core`)
//!
//! Shared data model for the entity-resolution toolkit: the [`Value`] /
//! [`Record`] types, dot-path field access, deep structural equality, and
//! canonical stringification + hashing used for cache keys.
//!
//! Every other crate in the workspace (`er-comparators`, `er-matching`,
//! `er-merge`, `er-queue`, `er-cache`, `er-service`) builds on the types
//! defined here rather than re-deriving its own notion of "a record".

pub mod adapter;
pub mod equality;
pub mod error;
pub mod stringify;
pub mod value;

pub use adapter::{AdapterError, Database, Filter, FilterCriteria, QueryOptions};
pub use equality::deep_equal;
pub use error::{ErrorKind, HasErrorKind};
pub use stringify::{fnv1a_hex, stable_stringify};
pub use value::{get_path, path_segments, set_path, walk_paths, Record, Value};
