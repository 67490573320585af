//! Root-relative file handles and their resolver.

mod resolver;
mod types;

pub use resolver::{NodeResolver, ResolveError};
pub use types::{BuildRoots, Node, RootTag};
