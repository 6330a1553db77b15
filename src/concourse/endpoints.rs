use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use super::client::ConcourseClient;
use crate::error::{BlockersError, Result};
use crate::pipeline::{Build, Job, Pipeline, ResourceConfig, ResourceVersion};

/// How many versions of a resource's history to fetch, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
}

impl Page {
    /// Only the most recent version.
    pub fn latest() -> Self {
        Self { limit: 1 }
    }
}

#[derive(Deserialize)]
struct PipelineConfigResponse {
    config: PipelineConfig,
}

#[derive(Deserialize)]
struct PipelineConfig {
    #[serde(default)]
    resources: Option<Vec<ResourceConfig>>,
}

impl ConcourseClient {
    pub async fn list_pipelines(&self) -> Result<Vec<Pipeline>> {
        let url = self.team_url(&["pipelines"])?;
        self.get_json(url).await
    }

    /// Finds a pipeline of this team by name.
    ///
    /// # Errors
    ///
    /// Returns [`BlockersError::PipelineNotFound`] if the team has no such pipeline.
    pub async fn find_pipeline(&self, name: &str) -> Result<Pipeline> {
        self.list_pipelines()
            .await?
            .into_iter()
            .find(|pipeline| pipeline.name == name)
            .ok_or_else(|| BlockersError::PipelineNotFound(name.to_string()))
    }

    /// Lists the jobs of a pipeline.
    ///
    /// The job-level `has_new_inputs` flag is copied onto every input.
    pub async fn list_jobs(&self, pipeline: &str) -> Result<Vec<Job>> {
        let url = self.team_url(&["pipelines", pipeline, "jobs"])?;
        let mut jobs: Vec<Job> = self.get_json(url).await?;

        for job in &mut jobs {
            let pending = job.has_new_inputs;
            for input in &mut job.inputs {
                input.has_new_inputs |= pending;
            }
        }

        debug!("Fetched {} jobs for pipeline {pipeline}", jobs.len());
        Ok(jobs)
    }

    pub async fn list_resource_versions(
        &self,
        pipeline: &str,
        resource: &str,
        page: Page,
    ) -> Result<Vec<ResourceVersion>> {
        let mut url = self.team_url(&["pipelines", pipeline, "resources", resource, "versions"])?;
        url.query_pairs_mut()
            .append_pair("limit", &page.limit.to_string());
        self.get_json(url).await
    }

    /// Builds that used the given resource version as an input.
    pub async fn builds_with_version_as_input(
        &self,
        pipeline: &str,
        resource: &str,
        version_id: u64,
    ) -> Result<Vec<Build>> {
        let version_id = version_id.to_string();
        let url = self.team_url(&[
            "pipelines",
            pipeline,
            "resources",
            resource,
            "versions",
            &version_id,
            "input_to",
        ])?;
        self.get_json(url).await
    }

    /// Resource declarations from the pipeline config, keyed by name.
    pub async fn resource_configs(&self, pipeline: &str) -> Result<HashMap<String, ResourceConfig>> {
        let url = self.team_url(&["pipelines", pipeline, "config"])?;
        let response: PipelineConfigResponse = self.get_json(url).await?;

        Ok(response
            .config
            .resources
            .unwrap_or_default()
            .into_iter()
            .map(|resource| (resource.name.clone(), resource))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::pipeline::BuildStatus;
    use mockito::Matcher;

    fn client(server: &mockito::Server, token: Option<&str>) -> ConcourseClient {
        ConcourseClient::new(&server.url(), "main", token.map(Token::from), false).unwrap()
    }

    #[tokio::test]
    async fn test_list_jobs_sends_token_and_propagates_pending_inputs() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/teams/main/pipelines/master/jobs")
            .match_header("authorization", "Bearer sekret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"id": 1, "name": "build", "inputs": [{"name": "repo", "resource": "repo", "trigger": true}], "has_new_inputs": true},
                    {"id": 2, "name": "deploy", "inputs": [{"name": "repo", "resource": "repo", "passed": ["build"]}]},
                    {"id": 3, "name": "manual", "inputs": null}
                ]"#,
            )
            .create_async()
            .await;

        let jobs = client(&server, Some("sekret")).list_jobs("master").await.unwrap();

        mock.assert_async().await;
        assert_eq!(jobs.len(), 3);
        assert!(jobs[0].inputs[0].has_new_inputs);
        assert_eq!(jobs[1].inputs[0].passed, vec!["build"]);
        assert!(!jobs[1].inputs[0].has_new_inputs);
        assert!(jobs[2].inputs.is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/teams/main/pipelines/master/jobs")
            .with_status(401)
            .with_body("not authorized")
            .create_async()
            .await;

        let err = client(&server, None).list_jobs("master").await.unwrap_err();

        match err {
            BlockersError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "not authorized");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_find_pipeline() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/teams/main/pipelines")
            .with_status(200)
            .with_body(r#"[{"id": 1, "name": "master", "paused": false, "team_name": "main"}]"#)
            .expect(2)
            .create_async()
            .await;
        let client = client(&server, None);

        let found = client.find_pipeline("master").await.unwrap();
        assert_eq!(found.id, 1);

        let missing = client.find_pipeline("release").await.unwrap_err();
        assert!(matches!(missing, BlockersError::PipelineNotFound(name) if name == "release"));
    }

    #[tokio::test]
    async fn test_list_resource_versions_requests_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/teams/main/pipelines/master/resources/repo/versions")
            .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
            .with_status(200)
            .with_body(r#"[{"id": 99, "version": {"ref": "abc"}, "enabled": true}]"#)
            .create_async()
            .await;

        let versions = client(&server, None)
            .list_resource_versions("master", "repo", Page::latest())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].id, 99);
        assert_eq!(versions[0].version["ref"], "abc");
    }

    #[tokio::test]
    async fn test_builds_with_version_as_input() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                "/api/v1/teams/main/pipelines/master/resources/repo/versions/99/input_to",
            )
            .with_status(200)
            .with_body(
                r#"[
                    {"id": 5, "name": "3", "status": "succeeded", "job_name": "unit", "start_time": 10, "end_time": 20},
                    {"id": 6, "name": "1", "status": "started", "job_name": "e2e", "start_time": 30}
                ]"#,
            )
            .create_async()
            .await;

        let builds = client(&server, None)
            .builds_with_version_as_input("master", "repo", 99)
            .await
            .unwrap();

        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].status, BuildStatus::Succeeded);
        assert_eq!(builds[1].end_time, None);
    }

    #[tokio::test]
    async fn test_resource_configs() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/teams/main/pipelines/master/config")
            .with_status(200)
            .with_body(
                r#"{"config": {
                    "jobs": [],
                    "resources": [
                        {"name": "repo", "type": "git", "source": {"uri": "https://example.com/r.git"}},
                        {"name": "image", "type": "registry-image", "source": null}
                    ]
                }, "version": "12"}"#,
            )
            .create_async()
            .await;

        let configs = client(&server, None).resource_configs("master").await.unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs["repo"].type_, "git");
        assert!(configs["image"].source.is_empty());
    }
}
