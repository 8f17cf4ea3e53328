use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::vision::VisionError;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("Either file upload or image URL is required")]
    MissingInput,
    #[error("Please provide either a file or URL, not both")]
    BothInputs,
    #[error("File must be an image")]
    NotAnImage,
    #[error("Invalid image URL")]
    InvalidUrl,
    #[error("Invalid form data: {0}")]
    InvalidForm(String),
    #[error("Failed to download image: {0}")]
    Download(String),
    #[error("Failed to process image: {0}")]
    Process(String),
    #[error("AI analysis failed: {0}")]
    Analysis(String),
    #[error("Failed to parse AI response: {0}")]
    Parse(String),
}

impl AnalyzeError {
    pub fn status(&self) -> StatusCode {
        match self {
            AnalyzeError::MissingInput
            | AnalyzeError::BothInputs
            | AnalyzeError::NotAnImage
            | AnalyzeError::InvalidUrl
            | AnalyzeError::InvalidForm(_)
            | AnalyzeError::Download(_)
            | AnalyzeError::Process(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::Analysis(_) | AnalyzeError::Parse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<VisionError> for AnalyzeError {
    fn from(e: VisionError) -> Self {
        match e {
            VisionError::Parse(msg) => AnalyzeError::Parse(msg),
            other => AnalyzeError::Analysis(other.to_string()),
        }
    }
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "analysis request failed");
        } else {
            tracing::warn!(error = %self, "analysis request rejected");
        }
        (status, Json(json!({"detail": self.to_string()}))).into_response()
    }
}
