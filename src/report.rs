use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::concourse::{ConcourseClient, Page};
use crate::error::Result;
use crate::output::PhaseProgress;
use crate::pipeline::{
    classify_pending, correlate, latest_builds_per_job, version_label, BuildResult, BuildStatus,
    Classification, DedupMode, DependencyGraph, GatingJob, GatingPath, JobIndex, ResourceConfig,
    ResourceVersion, Resolver,
};

/// Gating jobs of every job in a pipeline, classified from configuration.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrerequisitesReport {
    pub pipeline: String,
    pub mode: DedupMode,
    pub collected_at: DateTime<Utc>,
    pub jobs: Vec<JobPrerequisites>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobPrerequisites {
    pub job: String,
    pub resources: Vec<ResourcePrerequisites>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourcePrerequisites {
    pub resource: String,
    pub gating: Vec<ClassifiedJob>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClassifiedJob {
    #[serde(flatten)]
    pub job: GatingJob,
    pub classification: Classification,
}

/// Every chain of `passed` jobs into one job.
#[derive(Debug, Serialize, Deserialize)]
pub struct PathsReport {
    pub pipeline: String,
    pub job: String,
    pub collected_at: DateTime<Utc>,
    pub resources: Vec<ResourcePaths>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourcePaths {
    pub resource: String,
    pub paths: Vec<GatingPath>,
}

/// Build status of the gating jobs of one job, per resource, for the latest
/// version of each resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct BlockersReport {
    pub pipeline: String,
    pub job: String,
    pub mode: DedupMode,
    pub collected_at: DateTime<Utc>,
    pub resources: Vec<ResourceReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceReport {
    pub resource: String,
    #[serde(flatten)]
    pub outcome: ResourceOutcome,
}

/// A resource either resolves fully or reports why its data was unavailable.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ResourceOutcome {
    Resolved(ResourceStatus),
    Unavailable { error: String },
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ResourceStatus {
    /// Latest version; `None` when the resource has no versions yet
    pub version: Option<ResourceVersion>,
    pub version_label: Option<String>,
    pub results: Vec<BuildResult>,
    /// Latest status of every job that used the version, gating or not
    pub latest_by_job: BTreeMap<String, BuildStatus>,
}

/// Overall standing of a job across its gated resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Some gating job holds back some resource
    Blocked,
    /// Every gated resource has a version and no gating job holds it back
    Clear,
    /// Nothing is known to block, but some resource could not be fetched
    /// or has no version yet
    Unknown,
}

impl BlockersReport {
    /// A known blocker wins over missing data; missing data rules out clear.
    pub fn verdict(&self) -> Verdict {
        let mut complete = true;

        for resource in &self.resources {
            match &resource.outcome {
                ResourceOutcome::Resolved(status) => {
                    if status
                        .results
                        .iter()
                        .any(|r| r.classification == Classification::Blocked)
                    {
                        return Verdict::Blocked;
                    }
                    complete &= status.version.is_some();
                }
                ResourceOutcome::Unavailable { .. } => complete = false,
            }
        }

        if complete {
            Verdict::Clear
        } else {
            Verdict::Unknown
        }
    }
}

/// Builds the prerequisites listing from an already fetched job set.
pub fn prerequisites_report(
    pipeline: &str,
    jobs: &JobIndex,
    job_filter: Option<&str>,
    resource_filter: Option<&str>,
    mode: DedupMode,
) -> PrerequisitesReport {
    let resolver = Resolver::new(jobs, mode);

    let jobs = jobs
        .iter()
        .filter(|job| job_filter.map_or(true, |name| name == job.name))
        .map(|job| {
            let graph = resolver.resolve(&job.name);
            let resources = graph
                .iter()
                .filter(|(resource, _)| resource_filter.map_or(true, |name| name == *resource))
                .map(|(resource, gating)| ResourcePrerequisites {
                    resource: resource.to_string(),
                    gating: gating
                        .iter()
                        .map(|g| ClassifiedJob {
                            classification: classify_pending(g),
                            job: g.clone(),
                        })
                        .collect(),
                })
                .collect();

            JobPrerequisites {
                job: job.name.clone(),
                resources,
            }
        })
        .collect::<Vec<_>>();

    if jobs.is_empty() {
        if let Some(name) = job_filter {
            warn!("No job named '{name}' in pipeline {pipeline}");
        }
    }

    PrerequisitesReport {
        pipeline: pipeline.to_string(),
        mode,
        collected_at: Utc::now(),
        jobs,
    }
}

/// Answers "what is holding this job back" for one pipeline.
pub struct PipelineInspector {
    client: ConcourseClient,
    pipeline: String,
}

impl PipelineInspector {
    pub fn new(client: ConcourseClient, pipeline: impl Into<String>) -> Self {
        Self {
            client,
            pipeline: pipeline.into(),
        }
    }

    /// Fetches every job of the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the pipeline does not exist or the jobs cannot be listed.
    pub async fn job_index(&self) -> Result<JobIndex> {
        self.client.find_pipeline(&self.pipeline).await?;
        let jobs = self.client.list_jobs(&self.pipeline).await?;
        Ok(JobIndex::from_jobs(jobs))
    }

    /// Lists the gating jobs of every job (or only `job_filter`), classified
    /// without consulting build history.
    ///
    /// # Errors
    ///
    /// Returns an error if the job list cannot be fetched.
    pub async fn prerequisites(
        &self,
        job_filter: Option<&str>,
        resource_filter: Option<&str>,
        mode: DedupMode,
    ) -> Result<PrerequisitesReport> {
        info!("Collecting prerequisites for pipeline: {}", self.pipeline);
        let jobs = self.job_index().await?;
        Ok(prerequisites_report(
            &self.pipeline,
            &jobs,
            job_filter,
            resource_filter,
            mode,
        ))
    }

    /// Enumerates the `passed` chains into `job`.
    ///
    /// # Errors
    ///
    /// Returns an error if the job list cannot be fetched or a chain is cyclic.
    pub async fn paths(&self, job: &str, resource_filter: Option<&str>) -> Result<PathsReport> {
        info!("Enumerating passed paths into {job} on pipeline {}", self.pipeline);
        let jobs = self.job_index().await?;

        let resources = Resolver::new(&jobs, DedupMode::Edge)
            .all_paths(job)?
            .into_iter()
            .filter(|(resource, _)| resource_filter.map_or(true, |name| name == resource))
            .map(|(resource, paths)| ResourcePaths { resource, paths })
            .collect();

        Ok(PathsReport {
            pipeline: self.pipeline.clone(),
            job: job.to_string(),
            collected_at: Utc::now(),
            resources,
        })
    }

    /// Reports the latest build of every gating job of `job`, for the latest
    /// version of each gated resource.
    ///
    /// Progress is displayed in three phases:
    /// 1. Fetching the pipeline's jobs
    /// 2. Resolving gating jobs per resource
    /// 3. Fetching versions and builds, correlating them per resource
    ///
    /// # Errors
    ///
    /// Returns an error if the jobs or the pipeline config cannot be fetched.
    /// Failures while fetching a single resource's versions or builds are
    /// reported on that resource only.
    pub async fn blockers(&self, job: &str, mode: DedupMode) -> Result<BlockersReport> {
        info!("Collecting blockers for {job} on pipeline {}", self.pipeline);

        let progress = PhaseProgress::start_phase_1();
        let jobs = self.job_index().await?;

        let progress = progress.finish_phase_1_start_phase_2();
        let graph = Resolver::new(&jobs, mode).resolve(job);
        if graph.is_empty() {
            warn!("{job} has no passed constraints in pipeline {}", self.pipeline);
        }

        let progress = progress.finish_phase_2_start_phase_3();
        let resources = self.correlate_graph(&graph).await?;
        progress.finish_phase_3();

        Ok(BlockersReport {
            pipeline: self.pipeline.clone(),
            job: job.to_string(),
            mode,
            collected_at: Utc::now(),
            resources,
        })
    }

    async fn correlate_graph(&self, graph: &DependencyGraph) -> Result<Vec<ResourceReport>> {
        if graph.is_empty() {
            return Ok(vec![]);
        }

        let configs = self.client.resource_configs(&self.pipeline).await?;

        let futures: Vec<_> = graph
            .iter()
            .map(|(resource, gating)| self.resource_report(resource, gating, &configs))
            .collect();

        let mut reports = futures::future::join_all(futures).await;
        reports.sort_by(|a, b| a.resource.cmp(&b.resource));
        Ok(reports)
    }

    async fn resource_report(
        &self,
        resource: &str,
        gating: &[GatingJob],
        configs: &HashMap<String, ResourceConfig>,
    ) -> ResourceReport {
        let outcome = match self
            .resource_status(resource, gating, configs.get(resource))
            .await
        {
            Ok(status) => ResourceOutcome::Resolved(status),
            Err(e) => {
                warn!("Could not correlate builds for resource {resource}: {e}");
                ResourceOutcome::Unavailable {
                    error: e.to_string(),
                }
            }
        };

        ResourceReport {
            resource: resource.to_string(),
            outcome,
        }
    }

    async fn resource_status(
        &self,
        resource: &str,
        gating: &[GatingJob],
        config: Option<&ResourceConfig>,
    ) -> Result<ResourceStatus> {
        let versions = self
            .client
            .list_resource_versions(&self.pipeline, resource, Page::latest())
            .await?;

        let Some(latest) = versions.into_iter().next() else {
            info!("Resource {resource} has no versions yet");
            return Ok(ResourceStatus::default());
        };

        let builds = self
            .client
            .builds_with_version_as_input(&self.pipeline, resource, latest.id)
            .await?;

        let latest_by_job = latest_builds_per_job(&builds)
            .into_iter()
            .map(|(job, build)| (job, build.status))
            .collect();

        Ok(ResourceStatus {
            version_label: Some(version_label(config, &latest)),
            results: correlate(resource, &latest, gating, &builds),
            version: Some(latest),
            latest_by_job,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlockersError;
    use crate::pipeline::{Job, JobInput};
    use mockito::{Matcher, Mock, Server, ServerGuard};

    const PIPELINES: &str = r#"[{"id": 1, "name": "master", "team_name": "main"}]"#;

    // build -> unit -> deploy on repo, bake -> deploy on image
    const JOBS: &str = r#"[
        {"name": "build", "inputs": [
            {"name": "repo", "resource": "repo", "trigger": true},
            {"name": "image", "resource": "image", "trigger": true}
        ]},
        {"name": "unit", "inputs": [{"name": "repo", "resource": "repo", "passed": ["build"], "trigger": true}]},
        {"name": "bake", "inputs": [{"name": "image", "resource": "image", "passed": ["build"], "trigger": false}]},
        {"name": "deploy", "inputs": [
            {"name": "repo", "resource": "repo", "passed": ["unit"], "trigger": true},
            {"name": "image", "resource": "image", "passed": ["bake"], "trigger": false}
        ]}
    ]"#;

    const CONFIG: &str = r#"{"config": {"resources": [
        {"name": "repo", "type": "git", "source": {}},
        {"name": "image", "type": "registry-image", "source": {}}
    ]}}"#;

    async fn mock_get(server: &mut Server, path: &str, status: usize, body: &str) -> Mock {
        server
            .mock("GET", path)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_versions(server: &mut Server, resource: &str, status: usize, body: &str) -> Mock {
        server
            .mock(
                "GET",
                format!("/api/v1/teams/main/pipelines/master/resources/{resource}/versions").as_str(),
            )
            .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    /// Server answering the pipeline, jobs and config endpoints. Mocks live as
    /// long as the returned handles.
    async fn base_server() -> (ServerGuard, Vec<Mock>) {
        let mut server = Server::new_async().await;
        let mocks = vec![
            mock_get(&mut server, "/api/v1/teams/main/pipelines", 200, PIPELINES).await,
            mock_get(&mut server, "/api/v1/teams/main/pipelines/master/jobs", 200, JOBS).await,
            mock_get(&mut server, "/api/v1/teams/main/pipelines/master/config", 200, CONFIG).await,
        ];
        (server, mocks)
    }

    fn inspector(server: &Server) -> PipelineInspector {
        let client = ConcourseClient::new(&server.url(), "main", None, false).unwrap();
        PipelineInspector::new(client, "master")
    }

    fn resolved(report: &ResourceReport) -> &ResourceStatus {
        match &report.outcome {
            ResourceOutcome::Resolved(status) => status,
            ResourceOutcome::Unavailable { error } => panic!("resource unavailable: {error}"),
        }
    }

    #[tokio::test]
    async fn test_blockers_correlates_latest_version() {
        // Arrange
        let (mut server, mut mocks) = base_server().await;
        mocks.push(
            mock_versions(&mut server, "repo", 200, r#"[{"id": 10, "version": {"ref": "abc"}}]"#).await,
        );
        mocks.push(
            mock_versions(&mut server, "image", 200, r#"[{"id": 20, "version": {"digest": "sha256:1"}}]"#)
                .await,
        );
        mocks.push(
            mock_get(
                &mut server,
                "/api/v1/teams/main/pipelines/master/resources/repo/versions/10/input_to",
                200,
                r#"[
                {"id": 1, "status": "failed", "job_name": "unit", "end_time": 100},
                {"id": 2, "status": "succeeded", "job_name": "unit", "end_time": 200},
                {"id": 3, "status": "succeeded", "job_name": "build", "end_time": 50},
                {"id": 4, "status": "errored", "job_name": "deploy", "end_time": 300}
            ]"#,
            )
            .await,
        );
        mocks.push(
            mock_get(
                &mut server,
                "/api/v1/teams/main/pipelines/master/resources/image/versions/20/input_to",
                200,
                r#"[{"id": 5, "status": "succeeded", "job_name": "build", "end_time": 60}]"#,
            )
            .await,
        );

        // Act
        let report = inspector(&server)
            .blockers("deploy", DedupMode::Job)
            .await
            .unwrap();

        // Assert: resources come back sorted by name
        let names: Vec<&str> = report.resources.iter().map(|r| r.resource.as_str()).collect();
        assert_eq!(names, vec!["image", "repo"]);

        let image = resolved(&report.resources[0]);
        assert_eq!(image.version_label.as_deref(), Some("sha256:1"));
        let image_jobs: Vec<(&str, BuildStatus)> = image
            .results
            .iter()
            .map(|r| (r.job(), r.build.status))
            .collect();
        assert_eq!(
            image_jobs,
            vec![("build", BuildStatus::Succeeded), ("bake", BuildStatus::Missing)]
        );

        let repo = resolved(&report.resources[1]);
        assert_eq!(repo.version_label.as_deref(), Some("abc"));
        assert_eq!(repo.results.len(), 2);
        assert_eq!(repo.results[0].job(), "build");
        assert_eq!(repo.results[1].job(), "unit");
        assert_eq!(repo.results[1].build.id, 2);
        assert_eq!(repo.results[1].classification, Classification::Clear);
        assert_eq!(repo.latest_by_job["deploy"], BuildStatus::Errored);

        assert_eq!(report.verdict(), Verdict::Blocked);
    }

    #[tokio::test]
    async fn test_blockers_isolates_resource_failures() {
        let (mut server, _mocks) = base_server().await;
        let _repo = mock_versions(&mut server, "repo", 500, "boom").await;
        let _image = mock_versions(&mut server, "image", 200, "[]").await;

        let report = inspector(&server)
            .blockers("deploy", DedupMode::Job)
            .await
            .unwrap();

        assert_eq!(report.resources.len(), 2);

        let image = resolved(&report.resources[0]);
        assert!(image.version.is_none());
        assert!(image.results.is_empty());

        match &report.resources[1].outcome {
            ResourceOutcome::Unavailable { error } => assert!(error.contains("500")),
            ResourceOutcome::Resolved(_) => panic!("repo should be unavailable"),
        }
        assert_eq!(report.verdict(), Verdict::Unknown);
    }

    #[tokio::test]
    async fn test_blockers_for_ungated_job_skips_fetches() {
        let mut server = Server::new_async().await;
        let _pipelines = mock_get(&mut server, "/api/v1/teams/main/pipelines", 200, PIPELINES).await;
        let _jobs = mock_get(&mut server, "/api/v1/teams/main/pipelines/master/jobs", 200, JOBS).await;
        let config = server
            .mock("GET", "/api/v1/teams/main/pipelines/master/config")
            .expect(0)
            .create_async()
            .await;

        let report = inspector(&server)
            .blockers("build", DedupMode::Job)
            .await
            .unwrap();

        config.assert_async().await;
        assert!(report.resources.is_empty());
    }

    #[tokio::test]
    async fn test_missing_pipeline_is_terminal() {
        let mut server = Server::new_async().await;
        let _pipelines = mock_get(&mut server, "/api/v1/teams/main/pipelines", 200, "[]").await;

        let err = inspector(&server)
            .prerequisites(None, None, DedupMode::Job)
            .await
            .unwrap_err();

        assert!(matches!(err, BlockersError::PipelineNotFound(_)));
    }

    #[tokio::test]
    async fn test_paths_report() {
        let (server, _mocks) = base_server().await;

        let report = inspector(&server).paths("deploy", Some("repo")).await.unwrap();

        assert_eq!(report.resources.len(), 1);
        let repo = &report.resources[0];
        assert_eq!(repo.resource, "repo");
        assert_eq!(repo.paths.len(), 1);
        let chain: Vec<&str> = repo.paths[0].iter().map(|e| e.from.as_str()).collect();
        assert_eq!(chain, vec!["build", "unit"]);
    }

    #[test]
    fn test_prerequisites_report_filters_and_classifies() {
        let input = |resource: &str, passed: &[&str], trigger: bool| JobInput {
            name: resource.to_string(),
            resource: resource.to_string(),
            passed: passed.iter().map(ToString::to_string).collect(),
            trigger,
            has_new_inputs: false,
        };
        let jobs = JobIndex::from_jobs(vec![
            Job {
                name: "build".to_string(),
                inputs: vec![input("repo", &[], true)],
                has_new_inputs: true,
            },
            Job {
                name: "lint".to_string(),
                inputs: vec![input("repo", &[], false)],
                has_new_inputs: false,
            },
            Job {
                name: "ship".to_string(),
                inputs: vec![input("repo", &["build", "lint"], true), input("tools", &["lint"], false)],
                has_new_inputs: false,
            },
        ]);

        let report = prerequisites_report("master", &jobs, Some("ship"), Some("repo"), DedupMode::Job);

        assert_eq!(report.jobs.len(), 1);
        let ship = &report.jobs[0];
        assert_eq!(ship.resources.len(), 1);
        let classes: Vec<(&str, Classification)> = ship.resources[0]
            .gating
            .iter()
            .map(|g| (g.job.name.as_str(), g.classification))
            .collect();
        assert_eq!(
            classes,
            vec![
                ("build", Classification::Blocked),
                ("lint", Classification::Neutral)
            ]
        );
    }

    #[test]
    fn test_prerequisites_report_unknown_job() {
        let jobs = JobIndex::from_jobs(vec![]);
        let report = prerequisites_report("master", &jobs, Some("nope"), None, DedupMode::Edge);
        assert!(report.jobs.is_empty());
    }

    fn report_with(resources: Vec<(&str, ResourceOutcome)>) -> BlockersReport {
        BlockersReport {
            pipeline: "master".to_string(),
            job: "deploy".to_string(),
            mode: DedupMode::Job,
            collected_at: Utc::now(),
            resources: resources
                .into_iter()
                .map(|(resource, outcome)| ResourceReport {
                    resource: resource.to_string(),
                    outcome,
                })
                .collect(),
        }
    }

    fn resolved_with(classification: Option<Classification>) -> ResourceOutcome {
        let version = ResourceVersion {
            id: 10,
            version: BTreeMap::new(),
            enabled: true,
        };
        let results = classification
            .map(|classification| BuildResult {
                resource: "repo".to_string(),
                version: version.clone(),
                build: crate::pipeline::Build::missing("unit"),
                classification,
            })
            .into_iter()
            .collect();

        ResourceOutcome::Resolved(ResourceStatus {
            version: Some(version),
            version_label: Some("10".to_string()),
            results,
            latest_by_job: BTreeMap::new(),
        })
    }

    #[test]
    fn test_verdict_unavailable_resource_is_unknown() {
        // Arrange
        let report = report_with(vec![(
            "repo",
            ResourceOutcome::Unavailable {
                error: "status 500".to_string(),
            },
        )]);

        // Act & Assert
        assert_eq!(report.verdict(), Verdict::Unknown);
    }

    #[test]
    fn test_verdict_resource_without_versions_is_unknown() {
        let report = report_with(vec![
            ("image", ResourceOutcome::Resolved(ResourceStatus::default())),
            ("repo", resolved_with(Some(Classification::Clear))),
        ]);

        assert_eq!(report.verdict(), Verdict::Unknown);
    }

    #[test]
    fn test_verdict_blocked_wins_over_missing_data() {
        let report = report_with(vec![
            (
                "image",
                ResourceOutcome::Unavailable {
                    error: "status 500".to_string(),
                },
            ),
            ("repo", resolved_with(Some(Classification::Blocked))),
        ]);

        assert_eq!(report.verdict(), Verdict::Blocked);
    }

    #[test]
    fn test_verdict_clear_when_every_resource_resolved() {
        let report = report_with(vec![
            ("image", resolved_with(Some(Classification::Neutral))),
            ("repo", resolved_with(Some(Classification::Clear))),
        ]);

        assert_eq!(report.verdict(), Verdict::Clear);
    }

    #[test]
    fn test_report_json_shape() {
        let report = BlockersReport {
            pipeline: "master".to_string(),
            job: "deploy".to_string(),
            mode: DedupMode::Job,
            collected_at: Utc::now(),
            resources: vec![ResourceReport {
                resource: "repo".to_string(),
                outcome: ResourceOutcome::Unavailable {
                    error: "boom".to_string(),
                },
            }],
        };

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["mode"], "job");
        assert_eq!(json["resources"][0]["resource"], "repo");
        assert_eq!(json["resources"][0]["outcome"], "unavailable");
        assert_eq!(json["resources"][0]["error"], "boom");
    }
}
