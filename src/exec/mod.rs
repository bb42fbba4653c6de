// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the collaborator traits for building and for
//!   starting the artifact, plus their `tokio::process` implementations.
//!   Tests replace them with fakes.
//! - [`build`] is the stage that runs the build for every settled change.
//! - [`run`] is the stage that owns the supervised process and restarts it
//!   after each successful build.

pub mod backend;
pub mod build;
pub mod run;

pub use backend::{
    BuildBackend, ExitOutcome, ProcessBackend, ShellBuild, SupervisedProcess, TokioProcessBackend,
};
pub use build::BuildStage;
pub use run::RunStage;
