use std::net::SocketAddr;
use std::time::Duration;

/// Analysis service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
    /// OpenAI API key; analysis is disabled without one
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Longest edge an image may have before it is shrunk
    pub max_image_dimension: u32,
    pub jpeg_quality: u8,
    pub download_timeout: Duration,
    pub max_upload_bytes: usize,
    /// Accept invalid TLS certificates when downloading images
    pub insecure_ssl: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5000,
            openai_api_key: None,
            openai_model: "gpt-4o".to_string(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            max_image_dimension: 1024,
            jpeg_quality: 85,
            download_timeout: Duration::from_secs(10),
            max_upload_bytes: 20 * 1024 * 1024,
            insecure_ssl: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from `var`, which returns the raw value of a
    /// variable if set. Unparseable values fall back to defaults.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |name: &str| var(name).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            bind_address: var("CLAIMCOMPASS_BIND").unwrap_or(defaults.bind_address),
            port: var("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            openai_api_key: var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()),
            openai_model: var("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            openai_base_url: var("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            max_image_dimension: parsed("CLAIMCOMPASS_MAX_IMAGE_DIMENSION")
                .and_then(|d| u32::try_from(d).ok())
                .unwrap_or(defaults.max_image_dimension),
            jpeg_quality: parsed("CLAIMCOMPASS_JPEG_QUALITY")
                .map(|q| q.clamp(1, 100) as u8)
                .unwrap_or(defaults.jpeg_quality),
            download_timeout: parsed("CLAIMCOMPASS_DOWNLOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            max_upload_bytes: parsed("CLAIMCOMPASS_MAX_UPLOAD_BYTES")
                .and_then(|b| usize::try_from(b).ok())
                .unwrap_or(defaults.max_upload_bytes),
            insecure_ssl: var("CLAIMCOMPASS_INSECURE_SSL").as_deref() == Some("1"),
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.bind_address, self.port).parse()
    }
}
