//! Image source resolution: data URI, URL, local path or raw bytes → bytes.
//!
//! Logos and figures arrive from the HTTP layer in whatever shape the client
//! sent. This stage turns each into raw bytes for [`super::image_fit`].
//! Every failure is an [`ImageFitError`] so the orchestrator can treat it
//! like any other image problem: log it and render without the image.

use crate::error::ImageFitError;
use crate::pipeline::image_fit::decode_data_uri;
use std::path::PathBuf;
use tracing::{debug, info};

/// Largest image source accepted from a URL or file, in bytes.
pub const MAX_SOURCE_BYTES: u64 = 20 * 1024 * 1024;

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw bytes already in memory.
    Bytes(Vec<u8>),
    /// `data:image/...;base64,...`
    DataUri(String),
    /// `http://` or `https://` URL.
    Url(String),
    /// Local file.
    Path(PathBuf),
}

impl ImageSource {
    /// Classify a user-supplied string.
    pub fn parse(input: &str) -> ImageSource {
        let trimmed = input.trim();
        if trimmed.starts_with("data:") {
            ImageSource::DataUri(trimmed.to_string())
        } else if is_url(trimmed) {
            ImageSource::Url(trimmed.to_string())
        } else {
            ImageSource::Path(PathBuf::from(trimmed))
        }
    }

    /// Short description for log lines and error messages.
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Bytes(b) => format!("<{} bytes>", b.len()),
            ImageSource::DataUri(uri) => {
                let head: String = uri.chars().take(32).collect();
                format!("{head}…")
            }
            ImageSource::Url(url) => url.clone(),
            ImageSource::Path(p) => p.display().to_string(),
        }
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

impl From<&str> for ImageSource {
    fn from(s: &str) -> Self {
        ImageSource::parse(s)
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the bytes behind `source`, refusing anything over [`MAX_SOURCE_BYTES`].
pub async fn load_bytes(source: &ImageSource, timeout_secs: u64) -> Result<Vec<u8>, ImageFitError> {
    load_bytes_capped(source, timeout_secs, MAX_SOURCE_BYTES).await
}

async fn load_bytes_capped(
    source: &ImageSource,
    timeout_secs: u64,
    max_bytes: u64,
) -> Result<Vec<u8>, ImageFitError> {
    match source {
        ImageSource::Bytes(bytes) => Ok(bytes.clone()),
        ImageSource::DataUri(uri) => decode_data_uri(uri),
        ImageSource::Url(url) => download_url(url, timeout_secs, max_bytes).await,
        ImageSource::Path(path) => {
            let unavailable = |reason: String| ImageFitError::SourceUnavailable {
                source_ref: path.display().to_string(),
                reason,
            };
            let len = tokio::fs::metadata(path)
                .await
                .map_err(|e| unavailable(e.to_string()))?
                .len();
            if len > max_bytes {
                return Err(unavailable(too_big(len, max_bytes)));
            }
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| unavailable(e.to_string()))?;
            debug!("Read image {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
    }
}

fn too_big(len: u64, max_bytes: u64) -> String {
    format!("{len} bytes exceeds the {max_bytes}-byte limit")
}

async fn download_url(url: &str, timeout_secs: u64, max_bytes: u64) -> Result<Vec<u8>, ImageFitError> {
    info!("Downloading image from: {}", url);
    let unavailable = |reason: String| ImageFitError::SourceUnavailable {
        source_ref: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| unavailable(e.to_string()))?;

    let mut response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            unavailable(format!("timed out after {timeout_secs}s"))
        } else {
            unavailable(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(unavailable(format!("HTTP {}", response.status())));
    }
    if let Some(len) = response.content_length() {
        if len > max_bytes {
            return Err(unavailable(too_big(len, max_bytes)));
        }
    }

    // Content-Length can be absent or wrong; count what actually arrives.
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| unavailable(e.to_string()))?
    {
        let len = (bytes.len() + chunk.len()) as u64;
        if len > max_bytes {
            return Err(unavailable(too_big(len, max_bytes)));
        }
        bytes.extend_from_slice(&chunk);
    }
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
}
