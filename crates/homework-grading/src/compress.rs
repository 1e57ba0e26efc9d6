//! Size check before upload. Bytes are never altered.

use crate::types::CanonicalImage;

/// Decoded size above which a warning is logged, in KiB.
pub const COMPRESS_THRESHOLD_KB: usize = 1024;

/// Check the approximate decoded size of `image` against `max_kb` and
/// return it unchanged.
pub fn compress_image(image: CanonicalImage, max_kb: usize) -> CanonicalImage {
    let size_kb = image.approx_decoded_len() as f64 / 1024.0;
    if size_kb > max_kb as f64 {
        tracing::warn!("图片大小 {size_kb:.2}KB 超过限制 {max_kb}KB，建议压缩");
    }
    image
}
