//! stepcache-lib: build-step caching and dependency discovery.
//!
//! This crate provides the pieces that let a native-code build skip
//! unchanged translation units:
//! - `node`: root-relative file handles and their memoized resolver
//! - `signature`: machine-independent step identity (`uid`) and content signature (`sig`)
//! - `scan`: compiler wrapper that turns include reports into dependency edges
//! - `cache`: the shared, content-addressed artifact store and its metrics
//! - `snapshot`: build-state persistence and rebasing across checkouts
//! - `execute`: the build session tying these together

pub mod cache;
pub mod config;
pub mod consts;
pub mod execute;
pub mod node;
pub mod platform;
pub mod scan;
pub mod signature;
pub mod snapshot;
pub mod step;
pub mod util;
