use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Concourse returns `null` instead of `[]` for some empty collections.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A pipeline as listed by the team pipelines endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub team_name: String,
}

/// A job definition. Names are unique within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<JobInput>,
    #[serde(default)]
    pub has_new_inputs: bool,
}

/// One `get` step feeding a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    /// Step name, which may differ from the resource it fetches
    pub name: String,
    /// Resource fetched by this input
    pub resource: String,
    /// Jobs that must have built the same version before it is available here
    #[serde(default, deserialize_with = "null_as_default")]
    pub passed: Vec<String>,
    /// Whether a new version of the resource starts a build of the owning job
    #[serde(default)]
    pub trigger: bool,
    /// Whether an unconsumed version is waiting on this input
    #[serde(default)]
    pub has_new_inputs: bool,
}

impl Job {
    /// Inputs of this job that fetch `resource`.
    pub fn inputs_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a JobInput> {
        self.inputs.iter().filter(move |input| input.resource == resource)
    }

    /// Whether a new version of `resource` starts a build of this job.
    pub fn triggers_on(&self, resource: &str) -> bool {
        self.inputs_for(resource)
            .next()
            .is_some_and(|input| input.trigger)
    }

    /// Distinct resource names consumed by this job, in declaration order.
    pub fn resources(&self) -> Vec<&str> {
        let mut resources: Vec<&str> = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !resources.contains(&input.resource.as_str()) {
                resources.push(&input.resource);
            }
        }
        resources
    }
}

/// Jobs of one pipeline keyed by name, the universe the resolver walks.
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
    jobs: HashMap<String, Job>,
    order: Vec<String>,
}

impl JobIndex {
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let mut index = Self::default();
        for job in jobs {
            if !index.jobs.contains_key(&job.name) {
                index.order.push(job.name.clone());
            }
            index.jobs.insert(job.name.clone(), job);
        }
        index
    }

    pub fn get(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    /// Jobs in the order the provider listed them.
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.order.iter().filter_map(|name| self.jobs.get(name))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Resource declaration from the pipeline config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: BTreeMap<String, serde_json::Value>,
}

/// A concrete version of a resource; `id` is unique per resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVersion {
    pub id: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: BTreeMap<String, String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
    /// No build of the job exists for the version.
    #[serde(alias = "not running")]
    Missing,
}

impl BuildStatus {
    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Aborted => "aborted",
            Self::Missing => "missing",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build of a job. Timestamps are unix seconds; unfinished builds have no `end_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub status: BuildStatus,
    #[serde(default)]
    pub job_name: String,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl Build {
    /// Placeholder for a job that never built the version in question.
    pub fn missing(job_name: &str) -> Self {
        Self {
            id: 0,
            name: String::new(),
            status: BuildStatus::Missing,
            job_name: job_name.to_string(),
            start_time: None,
            end_time: None,
        }
    }

    /// Ordering key for "latest": end time first, build id breaks ties.
    pub fn recency(&self) -> (Option<i64>, u64) {
        (self.end_time, self.id)
    }
}

/// One gating relationship: `from` must pass `resource` before `to` sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub resource: String,
    pub from: String,
    pub to: String,
    /// Trigger flag of the `to` job's input
    pub trigger: bool,
}
