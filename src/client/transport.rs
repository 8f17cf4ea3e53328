use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::client::Submission;
use crate::models::HealthResponse;

/// Status and JSON body of one `/api/analyze` response. Bodies that are not
/// JSON are carried as `Value::Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerReply {
    pub status: u16,
    pub body: Value,
}

impl ServerReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Carries a submission to the analysis service. `Err` means the request
/// never produced an HTTP response.
#[async_trait]
pub trait AnalyzeTransport: Send + Sync {
    async fn analyze(&self, submission: &Submission) -> Result<ServerReply, String>;
}

#[async_trait]
impl<T: AnalyzeTransport + ?Sized> AnalyzeTransport for Arc<T> {
    async fn analyze(&self, submission: &Submission) -> Result<ServerReply, String> {
        (**self).analyze(submission).await
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn health(&self) -> Result<HealthResponse, reqwest::Error> {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    fn form_for(submission: &Submission) -> Result<Form, reqwest::Error> {
        Ok(match submission {
            Submission::File(file) => {
                let part = Part::bytes(file.bytes.clone())
                    .file_name(file.file_name.clone())
                    .mime_str(&file.mime_type)?;
                Form::new().part("file", part)
            }
            Submission::Url(url) => Form::new().text("image_url", url.to_string()),
        })
    }
}

#[async_trait]
impl AnalyzeTransport for HttpTransport {
    async fn analyze(&self, submission: &Submission) -> Result<ServerReply, String> {
        let form = Self::form_for(submission).map_err(|e| e.to_string())?;
        let response = self
            .client
            .post(format!("{}/api/analyze", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| e.to_string())?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(ServerReply { status, body })
    }
}
