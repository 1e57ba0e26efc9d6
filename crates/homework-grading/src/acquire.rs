//! Image acquisition from inline base64 or a remote URL.
//!
//! Both paths end in a [`CanonicalImage`]. URL downloads use a single GET
//! with browser-like headers, follow redirects, and are bounded by a timeout
//! and a size cap. Hosts that serve images under a generic content type are
//! tolerated when the URL looks like an image or the host looks like a CDN.

use std::time::Duration;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, REFERER};
use url::Url;

use crate::types::{CanonicalImage, GradingError, HomeworkResult};
use crate::validate;

/// Download timeout.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Largest accepted download, in bytes.
pub const MAX_DOWNLOAD_BYTES: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/120.0.0.0 Safari/537.36";

const SUPPORTED_CONTENT_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/x-icon",
    "image/svg+xml",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".bmp"];

const CDN_HOST_MARKERS: &[&str] = &["cdn", "sohu", "aliyun", "qcloud"];

/// Fetches and canonicalizes homework images.
#[derive(Clone)]
pub struct ImageAcquirer {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for ImageAcquirer {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAcquirer {
    pub fn new() -> Self {
        Self::with_timeout(DOWNLOAD_TIMEOUT)
    }

    /// Build an acquirer with a custom download timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Self::client_builder().build().unwrap_or_default();
        Self::with_client(client, timeout)
    }

    /// Use a caller-built client, e.g. one with proxy or DNS overrides.
    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Client builder preset with the redirect policy and browser user agent.
    pub fn client_builder() -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
    }

    /// Validate inline base64 and return it as a canonical image.
    pub fn from_base64(&self, data: &str) -> HomeworkResult<CanonicalImage> {
        validate::to_canonical(data).map_err(GradingError::BadBase64)
    }

    /// Download `url` and return it as a canonical image.
    pub async fn from_url(&self, url: &str) -> HomeworkResult<CanonicalImage> {
        tracing::info!("正在下载图片: {url}");

        let parsed = Url::parse(url)
            .map_err(|_| GradingError::ValidationFailed("请输入有效的图片URL地址".to_string()))?;

        let has_image_ext = has_image_extension(&parsed);
        let is_cdn = is_cdn_host(&parsed);
        if !has_image_ext && !is_cdn {
            tracing::warn!("URL格式检查警告: {url}，但将继续尝试下载");
        }

        let download = self.download(&parsed, has_image_ext || is_cdn);
        match tokio::time::timeout(self.timeout, download).await {
            Ok(result) => result,
            Err(_) => Err(GradingError::DownloadTimeout),
        }
    }

    async fn download(&self, url: &Url, looks_like_image: bool) -> HomeworkResult<CanonicalImage> {
        let response = self
            .client
            .get(url.clone())
            .headers(request_headers(url))
            .send()
            .await
            .map_err(|e| GradingError::DownloadUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GradingError::DownloadFailed {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media_type_of)
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| validate::DEFAULT_MEDIA_TYPE.to_string());
        tracing::info!("检测到的Content-Type: {content_type}");

        if !is_supported_content_type(&content_type) {
            if looks_like_image {
                tracing::warn!("Content-Type检查警告: {content_type}，但URL格式像图片，将继续处理");
            } else {
                return Err(GradingError::WrongContentType(content_type));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GradingError::DownloadUnreachable(e.to_string()))?;
        ensure_within_limit(bytes.len())?;

        tracing::info!(
            "图片下载成功，大小: {:.2}MB，格式: {content_type}",
            bytes.len() as f64 / (1024.0 * 1024.0)
        );

        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(CanonicalImage::new(content_type, &payload))
    }
}

fn request_headers(url: &Url) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("image/*,*/*;q=0.8"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Ok(origin) = HeaderValue::from_str(&url.origin().ascii_serialization()) {
        headers.insert(REFERER, origin);
    }
    headers
}

/// Reject downloads larger than [`MAX_DOWNLOAD_BYTES`].
pub fn ensure_within_limit(len: usize) -> HomeworkResult<()> {
    if len > MAX_DOWNLOAD_BYTES {
        return Err(GradingError::ImageTooLarge {
            size_mb: len as f64 / (1024.0 * 1024.0),
        });
    }
    Ok(())
}

/// The `type/subtype` portion of a Content-Type header value.
fn media_type_of(header: &str) -> String {
    header.split(';').next().unwrap_or("").trim().to_string()
}

fn is_supported_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    SUPPORTED_CONTENT_TYPES.iter().any(|t| lower.contains(t))
}

/// Whether the URL path ends in a known image extension.
pub fn has_image_extension(url: &Url) -> bool {
    let path = url.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Whether the host name carries one of the CDN markers.
pub fn is_cdn_host(url: &Url) -> bool {
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    CDN_HOST_MARKERS.iter().any(|m| host.contains(m))
}
