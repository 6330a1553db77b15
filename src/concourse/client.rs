use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::Token;
use crate::error::{BlockersError, Result};

/// Client for one team of a Concourse installation.
///
/// Every call is a single request: failures are returned to the caller
/// as they are, without retries.
pub struct ConcourseClient {
    client: Client,
    api_url: Url,
    team: String,
    token: Option<Token>,
}

impl ConcourseClient {
    /// Creates a client for `team` on the Concourse at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockersError::Config`] if the URL is invalid or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, team: &str, token: Option<Token>, insecure: bool) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("concourse-blockers/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| BlockersError::Config(format!("Failed to create HTTP client: {e}")))?;

        let api_url = Url::parse(base_url)
            .map_err(|e| BlockersError::Config(format!("Invalid base URL: {e}")))?;

        if api_url.cannot_be_a_base() {
            return Err(BlockersError::Config(format!(
                "Invalid base URL: {base_url}"
            )));
        }

        Ok(Self {
            client,
            api_url,
            team: team.to_string(),
            token,
        })
    }

    pub(super) fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    /// Builds `<base>/api/v1/teams/<team>/<segments...>`, escaping each segment.
    pub(super) fn team_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|()| BlockersError::Config(format!("Invalid base URL: {}", self.api_url)))?
            .pop_if_empty()
            .extend(["api", "v1", "teams", self.team.as_str()])
            .extend(segments);
        Ok(url)
    }

    pub(super) async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!("GET {url}");

        let response = self.auth_request(self.client.get(url)).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(BlockersError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
