use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use url::Url;

use crate::config::Config;
use crate::error::AnalyzeError;

// ── Constants ────────────────────────────────────────────────────────────────

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ── URL validation ───────────────────────────────────────────────────────────

/// Parses `raw` as an absolute http(s) URL with a host.
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let parsed = Url::parse(raw.trim()).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed),
        _ => None,
    }
}

pub fn validate_image_url(raw: &str) -> Result<Url, AnalyzeError> {
    parse_http_url(raw).ok_or(AnalyzeError::InvalidUrl)
}

// ── HTTP fetch ───────────────────────────────────────────────────────────────

/// Downloads remote images on behalf of URL submissions.
#[derive(Clone)]
pub struct ImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl ImageFetcher {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::ClientBuilder::new()
            .connect_timeout(std::time::Duration::from_secs(5))
            .timeout(config.download_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(BROWSER_USER_AGENT);

        if config.insecure_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        Ok(Self {
            client: builder.build()?,
            max_bytes: config.max_upload_bytes,
        })
    }

    pub async fn fetch(&self, url: &Url) -> Result<Vec<u8>, AnalyzeError> {
        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            if e.is_timeout() {
                AnalyzeError::Download(format!("TimeoutError: {}", e))
            } else if e.is_connect() {
                AnalyzeError::Download(format!("ConnectError: {}", e))
            } else {
                AnalyzeError::Download(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalyzeError::Download(format!(
                "upstream returned {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        if !content_type.starts_with("image/") {
            return Err(AnalyzeError::Download(
                "URL does not point to an image".to_string(),
            ));
        }

        let too_large = || {
            AnalyzeError::Download(format!("image exceeds {} bytes", self.max_bytes))
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        // Content-Length may be absent or wrong, so the cap is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AnalyzeError::Download(e.to_string()))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(url = %url, bytes = bytes.len(), "downloaded image");
        Ok(bytes)
    }
}

// ── Normalisation ────────────────────────────────────────────────────────────

/// Decodes `bytes`, flattens to RGB, shrinks to fit `max_dimension` square and
/// re-encodes as base64 JPEG for the vision model.
pub fn prepare_image(bytes: &[u8], max_dimension: u32, quality: u8) -> Result<String, AnalyzeError> {
    let decoded =
        image::load_from_memory(bytes).map_err(|e| AnalyzeError::Process(e.to_string()))?;

    let mut rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    if rgb.width() > max_dimension || rgb.height() > max_dimension {
        // `resize` keeps the aspect ratio and fits within the bounds.
        rgb = rgb.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }

    let mut jpeg = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| AnalyzeError::Process(e.to_string()))?;

    Ok(BASE64.encode(jpeg.into_inner()))
}

/// Runs [`prepare_image`] on the blocking pool so decoding and resizing
/// large photos does not stall the async workers.
pub async fn prepare_image_off_thread(
    bytes: Vec<u8>,
    max_dimension: u32,
    quality: u8,
) -> Result<String, AnalyzeError> {
    tokio::task::spawn_blocking(move || prepare_image(&bytes, max_dimension, quality))
        .await
        .map_err(|e| AnalyzeError::Process(e.to_string()))?
}
