//! Pipeline topology model and the pure logic that runs over it.

pub mod resolver;
pub mod status;
pub mod types;
pub mod version;

pub use resolver::{DedupMode, DependencyGraph, GatingJob, GatingPath, Resolver};
pub use status::{
    classify, classify_pending, correlate, latest_build_for, latest_builds_per_job, BuildResult,
    Classification,
};
pub use types::{
    Build, BuildStatus, Edge, Job, JobIndex, JobInput, Pipeline, ResourceConfig, ResourceVersion,
};
pub use version::version_label;
