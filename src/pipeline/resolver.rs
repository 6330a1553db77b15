use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use super::types::{Edge, JobIndex};
use crate::error::{BlockersError, Result};

/// How the resolver decides that a gating candidate was already seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Every distinct `(resource, from, to, trigger)` edge is kept once.
    Edge,
    /// Every distinct gating job is kept once.
    #[default]
    Job,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum VisitKey {
    Edge(Edge),
    Job(String),
}

impl DedupMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edge => "edge",
            Self::Job => "job",
        }
    }

    fn key(self, edge: &Edge) -> VisitKey {
        match self {
            Self::Edge => VisitKey::Edge(edge.clone()),
            Self::Job => VisitKey::Job(edge.from.clone()),
        }
    }
}

/// A job that must pass a resource before a downstream job may use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatingJob {
    pub name: String,
    /// The `passed` edge through which this job was reached
    pub edge: Edge,
    /// Whether this job itself triggers on the resource
    pub triggers: bool,
    pub has_new_inputs: bool,
}

/// Gating jobs per resource, each sequence ordered ancestor-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    resources: IndexMap<String, Vec<GatingJob>>,
}

impl DependencyGraph {
    pub fn get(&self, resource: &str) -> Option<&[GatingJob]> {
        self.resources.get(resource).map(Vec::as_slice)
    }

    /// Gating job names for `resource`; empty when the resource is not gated.
    pub fn job_names(&self, resource: &str) -> Vec<&str> {
        self.get(resource)
            .unwrap_or_default()
            .iter()
            .map(|gating| gating.name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[GatingJob])> {
        self.resources
            .iter()
            .map(|(resource, gating)| (resource.as_str(), gating.as_slice()))
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// An ordered chain of edges ending at the job a path was enumerated for.
pub type GatingPath = Vec<Edge>;

#[derive(Default)]
struct Traversal {
    visited: HashSet<VisitKey>,
    accepted: Vec<GatingJob>,
}

/// Walks `passed` constraints backwards from a job.
pub struct Resolver<'a> {
    jobs: &'a JobIndex,
    mode: DedupMode,
}

impl<'a> Resolver<'a> {
    pub fn new(jobs: &'a JobIndex, mode: DedupMode) -> Self {
        Self { jobs, mode }
    }

    /// Resolves the gating jobs of every resource consumed by `target`.
    ///
    /// Resources without any `passed` constraint are left out, and an unknown
    /// target yields an empty graph.
    pub fn resolve(&self, target: &str) -> DependencyGraph {
        let Some(job) = self.jobs.get(target) else {
            debug!("Job '{target}' not found, nothing to resolve");
            return DependencyGraph::default();
        };

        let resources = job
            .resources()
            .into_iter()
            .filter_map(|resource| {
                let gating = self.resolve_resource(target, resource);
                (!gating.is_empty()).then(|| (resource.to_string(), gating))
            })
            .collect();

        DependencyGraph { resources }
    }

    /// Gating jobs of a single resource for `target`, ancestor-first.
    pub fn resolve_resource(&self, target: &str, resource: &str) -> Vec<GatingJob> {
        let mut traversal = Traversal::default();
        self.visit(target, resource, &mut traversal);
        debug!(
            "Resolved {} gating entries for {target}/{resource} ({:?} mode)",
            traversal.accepted.len(),
            self.mode
        );
        traversal.accepted
    }

    // Candidates are accepted on discovery but emitted once their own
    // ancestors are emitted, so the output reads ancestor-first.
    fn visit(&self, job_name: &str, resource: &str, traversal: &mut Traversal) {
        let Some(job) = self.jobs.get(job_name) else {
            return;
        };

        for input in job.inputs_for(resource) {
            for upstream in &input.passed {
                let edge = Edge {
                    resource: input.resource.clone(),
                    from: upstream.clone(),
                    to: job.name.clone(),
                    trigger: input.trigger,
                };

                if !traversal.visited.insert(self.mode.key(&edge)) {
                    continue;
                }

                self.visit(upstream, resource, traversal);
                traversal.accepted.push(self.gating_job(edge));
            }
        }
    }

    fn gating_job(&self, edge: Edge) -> GatingJob {
        let upstream = self.jobs.get(&edge.from);
        GatingJob {
            name: edge.from.clone(),
            triggers: upstream.is_some_and(|job| job.triggers_on(&edge.resource)),
            has_new_inputs: upstream.is_some_and(|job| job.has_new_inputs),
            edge,
        }
    }

    /// Enumerates every chain of `passed` jobs leading to `target` on `resource`.
    ///
    /// Each path ends with the edge into `target`. Jobs shared between
    /// branches appear once per path that reaches them.
    ///
    /// # Errors
    ///
    /// Returns [`BlockersError::CyclicPassed`] when a job is reached again
    /// while it is still on the current chain.
    pub fn paths(&self, target: &str, resource: &str) -> Result<Vec<GatingPath>> {
        let mut chain = vec![target.to_string()];
        self.collect_paths(target, resource, &mut chain)
    }

    /// Path enumeration for every resource consumed by `target`.
    ///
    /// # Errors
    ///
    /// Fails on the first resource whose `passed` chain is cyclic.
    pub fn all_paths(&self, target: &str) -> Result<IndexMap<String, Vec<GatingPath>>> {
        let Some(job) = self.jobs.get(target) else {
            return Ok(IndexMap::new());
        };

        let mut all = IndexMap::new();
        for resource in job.resources() {
            let paths = self.paths(target, resource)?;
            if !paths.is_empty() {
                all.insert(resource.to_string(), paths);
            }
        }
        Ok(all)
    }

    fn collect_paths(
        &self,
        job_name: &str,
        resource: &str,
        chain: &mut Vec<String>,
    ) -> Result<Vec<GatingPath>> {
        let Some(job) = self.jobs.get(job_name) else {
            return Ok(vec![]);
        };

        let mut paths = Vec::new();
        for input in job.inputs_for(resource) {
            for upstream in &input.passed {
                if let Some(start) = chain.iter().position(|name| name == upstream) {
                    let mut cycle = chain[start..].to_vec();
                    cycle.push(upstream.clone());
                    return Err(BlockersError::CyclicPassed {
                        resource: resource.to_string(),
                        cycle,
                    });
                }

                let edge = Edge {
                    resource: input.resource.clone(),
                    from: upstream.clone(),
                    to: job.name.clone(),
                    trigger: input.trigger,
                };

                chain.push(upstream.clone());
                let sub_paths = self.collect_paths(upstream, resource, chain)?;
                chain.pop();

                if sub_paths.is_empty() {
                    paths.push(vec![edge]);
                } else {
                    paths.extend(sub_paths.into_iter().map(|mut path| {
                        path.push(edge.clone());
                        path
                    }));
                }
            }
        }

        Ok(paths)
    }
}
