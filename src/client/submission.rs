use std::path::Path;

use image::ImageFormat;
use url::Url;

use crate::client::ClientError;
use crate::imaging::parse_http_url;

/// An image file chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk, deriving its MIME type from the extension.
    /// Unrecognised extensions get `application/octet-stream` and are
    /// rejected later by validation.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime_type = ImageFormat::from_path(path)
            .map(|f| f.to_mime_type().to_string())
            .unwrap_or_else(|_| "application/octet-stream".to_string());
        Ok(Self::new(file_name, mime_type, bytes))
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.to_lowercase().starts_with("image/")
    }
}

/// Exactly one image reference for one analysis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    File(ImageFile),
    Url(Url),
}

impl Submission {
    /// Validates raw form inputs. A blank URL counts as absent.
    pub fn from_inputs(file: Option<ImageFile>, url: Option<&str>) -> Result<Self, ClientError> {
        let url = url.map(str::trim).filter(|u| !u.is_empty());
        match (file, url) {
            (None, None) => Err(ClientError::MissingInput),
            (Some(_), Some(_)) => Err(ClientError::BothInputs),
            (Some(file), None) => {
                if file.is_image() {
                    Ok(Submission::File(file))
                } else {
                    Err(ClientError::NotAnImage)
                }
            }
            (None, Some(raw)) => parse_http_url(raw)
                .map(Submission::Url)
                .ok_or(ClientError::InvalidUrl),
        }
    }
}
