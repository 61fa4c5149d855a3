//! # levelkv-doc — path-addressed documents
//!
//! A nested JSON object addressed by dot-separated paths, with a small
//! update DSL (`$set`, `$rpush`, `$inc`, `$del`) and selective retrieval of
//! sub-trees.
//!
//! ```text
//!  stored value ──from_slice──► MapDocument ──rich_set / rich_get──►
//!        ▲                          │
//!        └──────────to_vec──────────┘
//! ```
//!
//! The document is engine-agnostic: whoever owns the storage loads it as one
//! opaque value, mutates it here, and writes it back.

pub mod document;
pub mod error;

pub use document::{MapDocument, OPERATOR_SIGIL, PATH_DELIMITER};
pub use error::DocumentError;
