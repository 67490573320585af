//! Shared utilities.
//!
//! Common utilities used across the crate including hashing, path
//! normalization.

pub mod hash;
pub mod path;
