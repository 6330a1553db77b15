use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::resolver::GatingJob;
use super::types::{Build, ResourceVersion};

/// How a gating job stands with respect to a downstream trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// Passed, and triggers on the resource itself
    Clear,
    /// Holds the resource back
    Blocked,
    /// Gates through a `passed` constraint without triggering on the resource
    Neutral,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Blocked => "blocked",
            Self::Neutral => "neutral",
        }
    }
}

/// The latest build of a gating job for one resource version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub resource: String,
    pub version: ResourceVersion,
    pub build: Build,
    pub classification: Classification,
}

impl BuildResult {
    pub fn job(&self) -> &str {
        &self.build.job_name
    }
}

/// Classifies a gating job against the status of its latest build.
pub fn classify(gating: &GatingJob, build: &Build) -> Classification {
    if !build.status.is_success() {
        Classification::Blocked
    } else if gating.triggers {
        Classification::Clear
    } else {
        Classification::Neutral
    }
}

/// Classifies a gating job from its configuration and pending inputs alone.
pub fn classify_pending(gating: &GatingJob) -> Classification {
    if gating.has_new_inputs {
        Classification::Blocked
    } else if gating.triggers {
        Classification::Clear
    } else {
        Classification::Neutral
    }
}

/// Latest build of `job` among `builds`, by end time then build id.
pub fn latest_build_for<'a>(job: &str, builds: &'a [Build]) -> Option<&'a Build> {
    builds
        .iter()
        .filter(|build| build.job_name == job)
        .max_by_key(|build| build.recency())
}

/// Pairs every gating job with its latest build for `version`.
///
/// Jobs that never built the version get a [`Build::missing`] placeholder, so
/// the output always has one entry per gating job, in the same order.
pub fn correlate(
    resource: &str,
    version: &ResourceVersion,
    gating: &[GatingJob],
    builds: &[Build],
) -> Vec<BuildResult> {
    gating
        .iter()
        .map(|job| {
            let build = latest_build_for(&job.name, builds)
                .cloned()
                .unwrap_or_else(|| Build::missing(&job.name));

            BuildResult {
                resource: resource.to_string(),
                version: version.clone(),
                classification: classify(job, &build),
                build,
            }
        })
        .collect()
}

/// Reduces a build list to the latest build of each job.
pub fn latest_builds_per_job(builds: &[Build]) -> BTreeMap<String, Build> {
    builds.iter().fold(BTreeMap::new(), |mut latest, build| {
        let newer = latest
            .get(&build.job_name)
            .map_or(true, |current: &Build| build.recency() >= current.recency());
        if newer {
            latest.insert(build.job_name.clone(), build.clone());
        }
        latest
    })
}
