//! HTTP client for the Video Indexer REST API.
//!
//! Every route lives under `{endpoint}/{location}/Accounts/{account_id}` and
//! authenticates with an `accessToken` query parameter.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use mediadex_core::{MediadexConfig, VideoJob};

use crate::error::GatewayError;
use crate::gateway::{GatewayStatus, MediaGateway};
use crate::summary::SummaryRequest;

const MAX_NAME_CHARS: usize = 80;
const PROMPT_MODEL: &str = "GPT3_5Turbo";

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub api_endpoint: String,
    pub location: String,
    pub account_id: String,
    pub access_token: String,
    pub privacy: String,
    pub request_timeout: Duration,
    pub prompt_style: String,
    pub content_poll_interval: Duration,
    pub content_timeout: Option<Duration>,
}

impl GatewaySettings {
    pub fn from_config(config: &MediadexConfig) -> Self {
        Self {
            api_endpoint: config.gateway.api_endpoint.clone(),
            location: config.gateway.location.clone(),
            account_id: config.gateway.account_id.clone(),
            access_token: config.gateway.access_token.clone(),
            privacy: config.gateway.privacy.clone(),
            request_timeout: Duration::from_secs(config.gateway.request_timeout_secs),
            prompt_style: config.jobs.prompt_style.clone(),
            content_poll_interval: Duration::from_secs(config.jobs.content_poll_interval_secs),
            content_timeout: config.jobs.content_timeout_secs.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoProgress {
    #[serde(default)]
    processing_progress: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    videos: Vec<VideoProgress>,
}

pub struct VideoIndexerClient {
    client: reqwest::Client,
    settings: GatewaySettings,
}

impl VideoIndexerClient {
    pub fn new(settings: GatewaySettings) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| GatewayError::Transient(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/Accounts/{}/{}",
            self.settings.api_endpoint.trim_end_matches('/'),
            self.settings.location,
            self.settings.account_id,
            path
        )
    }

    fn token(&self) -> (&'static str, &str) {
        ("accessToken", self.settings.access_token.as_str())
    }

    async fn json(&self, resp: reqwest::Response) -> Result<serde_json::Value, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &body));
        }
        resp.json().await.map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn upload_by_url(&self, job: &VideoJob, name: &str) -> Result<reqwest::Response, GatewayError> {
        let parsed = reqwest::Url::parse(&job.media_path)
            .map_err(|_| GatewayError::Submission(format!("Invalid video URL: {}", job.media_path)))?;
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(GatewayError::Submission(format!(
                "Invalid video URL: {}",
                job.media_path
            )));
        }

        info!(name = %name, url = %job.media_path, "Submitting video by URL");
        Ok(self
            .client
            .post(self.url("Videos"))
            .query(&[
                self.token(),
                ("name", name),
                ("description", job.description.as_str()),
                ("privacy", self.settings.privacy.as_str()),
                ("language", job.language.as_str()),
                ("videoUrl", job.media_path.as_str()),
            ])
            .send()
            .await?)
    }

    async fn upload_by_file(&self, job: &VideoJob, name: &str) -> Result<reqwest::Response, GatewayError> {
        let path = Path::new(&job.media_path);
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            GatewayError::Submission(format!("Could not find the local file {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());

        let body = reqwest::Body::wrap_stream(tokio_util::io::ReaderStream::new(file));
        let form = Form::new().part("file", Part::stream(body).file_name(file_name));

        info!(name = %name, path = %path.display(), "Submitting video file");
        Ok(self
            .client
            .post(self.url("Videos"))
            .query(&[
                self.token(),
                ("name", name),
                ("description", job.description.as_str()),
                ("privacy", self.settings.privacy.as_str()),
                ("partition", job.partition.as_str()),
                ("language", job.language.as_str()),
            ])
            .multipart(form)
            .send()
            .await?)
    }

    /// `Ok(None)` while the content has not been generated yet.
    async fn prompt_content(&self, video_id: &str) -> Result<Option<serde_json::Value>, GatewayError> {
        let resp = self
            .client
            .get(self.url(&format!("Videos/{}/PromptContent", video_id)))
            .query(&[self.token()])
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.json(resp).await.map(Some)
    }
}

#[async_trait]
impl MediaGateway for VideoIndexerClient {
    async fn submit(&self, job: &VideoJob) -> Result<String, GatewayError> {
        let name: String = job.name.chars().take(MAX_NAME_CHARS).collect();
        let resp = if job.is_url() {
            self.upload_by_url(job, &name).await?
        } else {
            self.upload_by_file(job, &name).await?
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match GatewayError::from_status(status, &body) {
                GatewayError::Http { status, message } => {
                    GatewayError::Submission(format!("upload rejected with {}: {}", status, message))
                }
                other => other,
            });
        }

        let upload: UploadResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        let id = upload
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatewayError::Decode("upload response has no video id".to_string()))?;

        info!(video_id = %id, name = %name, "Video uploaded");
        Ok(id)
    }

    async fn poll(&self, video_id: &str, language: &str) -> Result<GatewayStatus, GatewayError> {
        let resp = self
            .client
            .get(self.url(&format!("Videos/{}/Index", video_id)))
            .query(&[self.token(), ("language", language)])
            .send()
            .await?;
        let value = self.json(resp).await?;
        let index: IndexResponse =
            serde_json::from_value(value).map_err(|e| GatewayError::Decode(e.to_string()))?;

        let status = GatewayStatus {
            state: index.state.unwrap_or_default(),
            progress: index
                .videos
                .into_iter()
                .next()
                .and_then(|v| v.processing_progress)
                .unwrap_or_default(),
        };
        debug!(video_id = %video_id, state = %status.state, progress = %status.progress, "Polled video");
        Ok(status)
    }

    async fn fetch_content(&self, video_id: &str) -> Result<serde_json::Value, GatewayError> {
        if let Some(content) = self.prompt_content(video_id).await? {
            debug!(video_id = %video_id, "Prompt content already generated");
            return Ok(content);
        }

        let resp = self
            .client
            .post(self.url(&format!("Videos/{}/PromptContent", video_id)))
            .query(&[
                self.token(),
                ("modelName", PROMPT_MODEL),
                ("promptStyle", self.settings.prompt_style.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::from_status(status, &body));
        }
        info!(video_id = %video_id, "Prompt content generation started");

        let started = tokio::time::Instant::now();
        loop {
            if let Some(content) = self.prompt_content(video_id).await? {
                return Ok(content);
            }
            if let Some(limit) = self.settings.content_timeout {
                if started.elapsed() >= limit {
                    return Err(GatewayError::Transient(format!(
                        "prompt content for {} not ready after {}s",
                        video_id,
                        limit.as_secs()
                    )));
                }
            }
            debug!(video_id = %video_id, "Prompt content not ready yet");
            tokio::time::sleep(self.settings.content_poll_interval).await;
        }
    }

    async fn list_videos(&self) -> Result<serde_json::Value, GatewayError> {
        let resp = self
            .client
            .get(self.url("Videos"))
            .query(&[self.token()])
            .send()
            .await?;
        self.json(resp).await
    }

    async fn create_summary(
        &self,
        video_id: &str,
        request: &SummaryRequest,
    ) -> Result<serde_json::Value, GatewayError> {
        let resp = self
            .client
            .post(self.url(&format!("Videos/{}/Summaries/Textual", video_id)))
            .query(&[
                self.token(),
                ("deploymentName", request.model.as_str()),
                ("length", request.length.as_str()),
                ("style", request.style.as_str()),
            ])
            .send()
            .await?;
        self.json(resp).await
    }

    async fn list_summaries(
        &self,
        video_id: &str,
        summary_id: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError> {
        let req = match summary_id {
            Some(id) => self
                .client
                .get(self.url(&format!("Videos/{}/Summaries/Textual/{}", video_id, id)))
                .query(&[self.token()]),
            None => self
                .client
                .get(self.url(&format!("Videos/{}/Summaries/Textual", video_id)))
                .query(&[self.token(), ("pageNumber", "0"), ("pageSize", "20")]),
        };
        self.json(req.send().await?).await
    }
}
