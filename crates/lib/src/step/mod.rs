//! Build steps and the environment scopes they read.

mod env;
mod types;

pub use env::{BuildEnv, EnvId};
pub use types::{BuildStep, BuildStepBuilder, ScanState, StepLabels};
