//! HTTP loader posting task batches to the task-tracking service.
//!
//! Batches go to `{base_url}/project/{project}/challenge/{challenge}/tasks`
//! as a JSON array of task bodies. The API key, when configured, travels in
//! the `apiKey` header.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use super::{Task, TaskLoader, UploadError};

/// Default user agent for task service requests.
pub const DEFAULT_USER_AGENT: &str = "geoflag-upload/0.1";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_KEY_HEADER: &str = "apiKey";

/// Configuration for [`HttpTaskLoader`].
#[derive(Debug, Clone)]
pub struct HttpTaskLoaderConfig {
    /// Base URL of the service API, for example `"http://localhost:9000/api/v2"`.
    pub base_url: String,
    /// Key sent with every request.
    pub api_key: Option<String>,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpTaskLoaderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/api/v2".to_owned(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpTaskLoaderConfig {
    /// Create a configuration for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// [`TaskLoader`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTaskLoader {
    client: Client,
    config: HttpTaskLoaderConfig,
}

impl HttpTaskLoader {
    /// Create a loader for `base_url` with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, UploadError> {
        Self::with_config(HttpTaskLoaderConfig::new(base_url))
    }

    /// Create a loader from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::HttpClient`] if the HTTP client cannot be built.
    pub fn with_config(config: HttpTaskLoaderConfig) -> Result<Self, UploadError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(UploadError::HttpClient)?;
        Ok(Self { client, config })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpTaskLoaderConfig {
        &self.config
    }

    fn tasks_url(&self, project: &str, challenge: &str) -> Result<Url, UploadError> {
        let invalid = |message: String| UploadError::InvalidUrl {
            url: self.config.base_url.clone(),
            message,
        };
        let mut url = Url::parse(&self.config.base_url).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("URL cannot be a base".to_owned()))?
            .pop_if_empty()
            .extend(["project", project, "challenge", challenge, "tasks"]);
        Ok(url)
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &Url) -> UploadError {
        if error.is_timeout() {
            return UploadError::Timeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return UploadError::Http {
                url: url.to_string(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        UploadError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait(?Send)]
impl TaskLoader for HttpTaskLoader {
    fn connection_info(&self) -> String {
        self.config.base_url.clone()
    }

    async fn upload_batch(
        &self,
        project: &str,
        challenge: &str,
        tasks: &[Task],
    ) -> Result<(), UploadError> {
        let url = self.tasks_url(project, challenge)?;
        let body: Vec<Value> = tasks.iter().map(Task::to_json).collect();
        let mut request = self.client.post(url.clone()).json(&body);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(API_KEY_HEADER, api_key);
        }
        request
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, &url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, &url))?;
        debug!("posted {} tasks to {url}", tasks.len());
        Ok(())
    }
}
