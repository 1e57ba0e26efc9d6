//! Input classification and base64 image validation.

use std::sync::OnceLock;

use regex::Regex;

use crate::types::CanonicalImage;

/// Largest accepted base64 payload: 5 MiB of decoded bytes, in encoded characters.
pub const MAX_BASE64_LEN: usize = 5 * 1024 * 1024 * 4 / 3;

/// Media type assumed for bare base64 strings.
pub const DEFAULT_MEDIA_TYPE: &str = "image/jpeg";

const TOO_LARGE: &str = "图片文件过大，请使用小于5MB的图片";
const INVALID_FORMAT: &str = "无效的Base64图片格式";

/// What kind of image reference a caller handed us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Url,
    Base64,
    Unknown,
}

fn data_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:image/(png|jpe?g|gif);base64,([A-Za-z0-9+/]+=*)$")
            .expect("data uri regex is valid")
    })
}

fn bare_base64_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9+/]+=*$").expect("base64 regex is valid"))
}

fn image_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:image/(png|jpg|jpeg|gif|bmp|webp);base64,")
            .expect("image prefix regex is valid")
    })
}

/// Classify an input string as a URL, base64 data, or neither.
///
/// `data:` URIs are absolute URLs syntactically but are reported as base64.
pub fn classify(input: &str) -> InputKind {
    if let Ok(url) = url::Url::parse(input) {
        if url.scheme() != "data" {
            return InputKind::Url;
        }
    }

    if input.starts_with("data:image/") || bare_base64_regex().is_match(input) {
        InputKind::Base64
    } else {
        InputKind::Unknown
    }
}

/// Whether `input` is an absolute `http` or `https` URL with a host.
pub fn is_http_url(input: &str) -> bool {
    match url::Url::parse(input) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Successful base64 validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBase64 {
    pub media_type: String,
    pub payload_len: usize,
}

/// Validate a data-URI or bare base64 image string.
///
/// Returns the media type on success and the human-readable reason on
/// failure.
pub fn validate_base64(input: &str) -> Result<ValidatedBase64, String> {
    if let Some(caps) = data_uri_regex().captures(input) {
        let media_type = format!("image/{}", &caps[1]);
        let payload_len = caps[2].len();
        if payload_len > MAX_BASE64_LEN {
            return Err(TOO_LARGE.to_string());
        }
        return Ok(ValidatedBase64 {
            media_type,
            payload_len,
        });
    }

    if bare_base64_regex().is_match(input) {
        if input.len() > MAX_BASE64_LEN {
            return Err(TOO_LARGE.to_string());
        }
        return Ok(ValidatedBase64 {
            media_type: DEFAULT_MEDIA_TYPE.to_string(),
            payload_len: input.len(),
        });
    }

    Err(INVALID_FORMAT.to_string())
}

/// Validate and canonicalize base64 input into a data-URI image.
pub fn to_canonical(input: &str) -> Result<CanonicalImage, String> {
    let validated = validate_base64(input)?;
    Ok(CanonicalImage::new(
        validated.media_type,
        strip_data_uri_prefix(input),
    ))
}

/// The subtype of a `data:image/<fmt>;base64,` prefix, if recognized.
pub fn image_format(data_uri: &str) -> Option<&str> {
    image_prefix_regex()
        .captures(data_uri)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Drop everything up to and including the first `;base64,`.
pub fn strip_data_uri_prefix(data_uri: &str) -> &str {
    if !data_uri.starts_with("data:") {
        return data_uri;
    }
    match data_uri.find(";base64,") {
        Some(idx) => &data_uri[idx + ";base64,".len()..],
        None => data_uri,
    }
}
