//! Build-state snapshots and their portability across checkouts.

mod deps;
mod rebase;
mod storage;
mod types;

pub use deps::{DEPS_KEY, record_dependencies, restore_dependencies};
pub use rebase::rebase;
pub use storage::{load, load_rebased, save};
pub use types::{BuildStateSnapshot, SnapshotError, SnapshotValue};
