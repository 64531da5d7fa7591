//! Patch plans and the runner that applies them.
//!
//! A plan is a TOML file listing resource and source steps. The runner
//! applies them one by one against a project root, so later steps see the
//! results of earlier ones (e.g., `run_plan`).

pub mod plan;
pub mod runner;

pub use plan::{FilesStep, KeyStep, Plan, RelocateStep, RtlStep, Step, ValueStep};
pub use runner::{
    FileOutcome, Outcome, ProgressReporter, RunOptions, RunReport, SilentProgress, StepReport,
    run_plan,
};
