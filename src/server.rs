use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::Method,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::error::AnalyzeError;
use crate::imaging::{self, ImageFetcher};
use crate::models::{AnalysisResponse, ApiInfo, HealthResponse};
use crate::vision::{DamageAnalyzer, OpenAiAnalyzer};

/// Shared state for the analysis routes.
pub struct AppState {
    config: Config,
    fetcher: ImageFetcher,
    analyzer: Option<Arc<dyn DamageAnalyzer>>,
}

impl AppState {
    pub fn new(
        config: Config,
        analyzer: Option<Arc<dyn DamageAnalyzer>>,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = ImageFetcher::new(&config)?;
        Ok(Self {
            config,
            fetcher,
            analyzer,
        })
    }

    /// State backed by the OpenAI analyzer when a key is configured.
    pub fn from_config(config: Config) -> Result<Self, reqwest::Error> {
        let analyzer = OpenAiAnalyzer::from_config(&config)?
            .map(|a| Arc::new(a) as Arc<dyn DamageAnalyzer>);
        if analyzer.is_none() {
            tracing::warn!("OPENAI_API_KEY not found. Analysis features will be disabled.");
        }
        Self::new(config, analyzer)
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health))
        .route("/api", get(api_root))
        .route("/api/analyze", post(analyze_endpoint))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse::healthy())
}

async fn api_root() -> impl IntoResponse {
    Json(ApiInfo::current())
}

// ── Form handling ────────────────────────────────────────────────────────────

struct UploadedFile {
    content_type: Option<String>,
    file_name: Option<String>,
    bytes: Vec<u8>,
}

enum ImageSource {
    Upload(UploadedFile),
    Url(String),
}

async fn read_form(mut multipart: Multipart) -> Result<ImageSource, AnalyzeError> {
    let mut file = None;
    let mut image_url = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalyzeError::InvalidForm(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AnalyzeError::InvalidForm(e.to_string()))?;
                // Browsers send an empty, unnamed part for an untouched file input.
                if !bytes.is_empty() || file_name.as_deref().is_some_and(|n| !n.is_empty()) {
                    file = Some(UploadedFile {
                        content_type,
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            Some("image_url") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AnalyzeError::InvalidForm(e.to_string()))?;
                if !text.trim().is_empty() {
                    image_url = Some(text);
                }
            }
            _ => {}
        }
    }

    match (file, image_url) {
        (None, None) => Err(AnalyzeError::MissingInput),
        (Some(_), Some(_)) => Err(AnalyzeError::BothInputs),
        (Some(file), None) => Ok(ImageSource::Upload(file)),
        (None, Some(url)) => Ok(ImageSource::Url(url)),
    }
}

// ── Analysis ─────────────────────────────────────────────────────────────────

async fn analyze_endpoint(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalysisResponse>, AnalyzeError> {
    let multipart = multipart.map_err(|e| AnalyzeError::InvalidForm(e.to_string()))?;
    let source = read_form(multipart).await?;

    let image_bytes = match source {
        ImageSource::Upload(file) => {
            let is_image = file
                .content_type
                .as_deref()
                .is_some_and(|ct| ct.to_lowercase().starts_with("image/"));
            if !is_image {
                return Err(AnalyzeError::NotAnImage);
            }
            tracing::info!(
                file_name = file.file_name.as_deref().unwrap_or(""),
                bytes = file.bytes.len(),
                "analyzing uploaded image"
            );
            file.bytes
        }
        ImageSource::Url(raw) => {
            let url = imaging::validate_image_url(&raw)?;
            tracing::info!(url = %url, "analyzing image from url");
            state.fetcher.fetch(&url).await?
        }
    };

    let jpeg_base64 = imaging::prepare_image_off_thread(
        image_bytes,
        state.config.max_image_dimension,
        state.config.jpeg_quality,
    )
    .await?;

    let Some(analyzer) = state.analyzer.as_ref() else {
        tracing::warn!("analysis requested but no model credentials are configured");
        return Ok(Json(AnalysisResponse::analysis_unavailable()));
    };

    let assessment = analyzer.analyze(&jpeg_base64).await?;
    tracing::info!(
        make = %assessment.make,
        model = %assessment.model,
        "analysis complete"
    );
    Ok(Json(AnalysisResponse::success(assessment)))
}
