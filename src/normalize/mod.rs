//! Image normalization before caching and upload.
//!
//! Every capture is decoded, scaled down so its long edge fits within a
//! fixed bound (aspect ratio preserved, never upscaled), and re-encoded as
//! JPEG at a fixed quality. The output is deterministic for identical input.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

use crate::models::{ImageHandle, NormalizedImage};

/// Default bound for the long edge, in pixels.
pub const DEFAULT_MAX_EDGE: u32 = 800;

/// Default JPEG quality in (0, 1].
pub const DEFAULT_QUALITY: f32 = 0.7;

/// Errors from image normalization.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The source could not be decoded as an image.
    #[error("Unreadable image {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("Image encoding failed: {0}")]
    Encode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resizes and recompresses raw captures into a canonical JPEG.
#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_edge: u32,
    quality: f32,
    output_dir: PathBuf,
}

impl ImageNormalizer {
    /// Create a normalizer writing its output into `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_edge: DEFAULT_MAX_EDGE,
            quality: DEFAULT_QUALITY,
            output_dir: output_dir.into(),
        }
    }

    /// Set the long-edge bound in pixels.
    pub fn with_max_edge(mut self, max_edge: u32) -> Self {
        self.max_edge = max_edge.max(1);
        self
    }

    /// Set the compression quality, clamped into (0, 1].
    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    pub fn max_edge(&self) -> u32 {
        self.max_edge
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    /// Normalize `raw` into a new JPEG file in the output directory.
    pub async fn normalize(&self, raw: &ImageHandle) -> Result<NormalizedImage, NormalizeError> {
        let bytes = raw.read().await.map_err(|e| NormalizeError::Unreadable {
            path: raw.path().to_path_buf(),
            reason: e.to_string(),
        })?;

        let max_edge = self.max_edge;
        let quality = self.quality;
        let source_path = raw.path().to_path_buf();
        let (encoded, width, height) = tokio::task::spawn_blocking(move || {
            normalize_bytes(&bytes, max_edge, quality).map_err(|e| match e {
                NormalizeError::Unreadable { reason, .. } => NormalizeError::Unreadable {
                    path: source_path,
                    reason,
                },
                other => other,
            })
        })
        .await
        .map_err(|e| NormalizeError::Encode(e.to_string()))??;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let output = self.output_path(raw.path());
        tokio::fs::write(&output, &encoded).await?;

        debug!(
            "Normalized {} -> {} ({}x{}, {} bytes)",
            raw.path().display(),
            output.display(),
            width,
            height,
            encoded.len()
        );

        Ok(NormalizedImage {
            location: ImageHandle::from_parts(output, encoded.len() as u64),
            width,
            height,
            quality: self.quality,
        })
    }

    fn output_path(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("capture");
        self.output_dir.join(format!("{}.normalized.jpg", stem))
    }
}

/// Decode, bound and re-encode an image held in memory.
///
/// Returns the JPEG bytes and the output dimensions.
pub fn normalize_bytes(
    bytes: &[u8],
    max_edge: u32,
    quality: f32,
) -> Result<(Vec<u8>, u32, u32), NormalizeError> {
    let img = image::load_from_memory(bytes).map_err(|e| NormalizeError::Unreadable {
        path: PathBuf::new(),
        reason: describe_unreadable(bytes, &e),
    })?;

    let (width, height) = fit_within(img.width(), img.height(), max_edge);
    let img = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut encoded = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut encoded, quality_percent(quality));
    rgb.write_with_encoder(encoder)
        .map_err(|e| NormalizeError::Encode(e.to_string()))?;

    Ok((encoded.into_inner(), width, height))
}

/// Scale `(width, height)` so the long edge is at most `max_edge`.
/// Images already within bounds keep their size. A zero bound is treated as 1.
pub fn fit_within(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    let max_edge = max_edge.max(1);
    let long_edge = width.max(height);
    if long_edge <= max_edge || long_edge == 0 {
        return (width, height);
    }

    let scale = max_edge as f64 / long_edge as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).clamp(1, max_edge);
    if width >= height {
        (max_edge, scaled(height))
    } else {
        (scaled(width), max_edge)
    }
}

fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() || quality <= 0.0 {
        0.01
    } else {
        quality.min(1.0)
    }
}

/// Map a (0, 1] quality to the encoder's 1-100 scale.
fn quality_percent(quality: f32) -> u8 {
    (clamp_quality(quality) * 100.0).round().clamp(1.0, 100.0) as u8
}

fn describe_unreadable(bytes: &[u8], err: &image::ImageError) -> String {
    match infer::get(bytes) {
        Some(kind) if kind.matcher_type() != infer::MatcherType::Image => {
            format!("not an image (detected {})", kind.mime_type())
        }
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use tempfile::tempdir;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_fit_within_landscape() {
        assert_eq!(fit_within(1600, 1200, 800), (800, 600));
    }

    #[test]
    fn test_fit_within_portrait() {
        assert_eq!(fit_within(1200, 1600, 800), (600, 800));
    }

    #[test]
    fn test_fit_within_never_upscales() {
        assert_eq!(fit_within(640, 480, 800), (640, 480));
        assert_eq!(fit_within(800, 800, 800), (800, 800));
    }

    #[test]
    fn test_fit_within_extreme_aspect_keeps_one_pixel() {
        assert_eq!(fit_within(10_000, 2, 800), (800, 1));
    }

    #[test]
    fn test_fit_within_zero_bound_does_not_panic() {
        assert_eq!(fit_within(10, 5, 0), (1, 1));
        assert_eq!(fit_within(5, 10, 0), (1, 1));
        assert_eq!(fit_within(0, 0, 0), (0, 0));
    }

    #[test]
    fn test_quality_percent() {
        assert_eq!(quality_percent(0.7), 70);
        assert_eq!(quality_percent(1.0), 100);
        assert_eq!(quality_percent(5.0), 100);
        assert_eq!(quality_percent(0.0), 1);
    }

    #[test]
    fn test_normalize_bytes_resizes_and_encodes_jpeg() {
        let (jpeg, width, height) = normalize_bytes(&png_bytes(1000, 500), 800, 0.7).unwrap();
        assert_eq!((width, height), (800, 400));
        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 400));
    }

    #[test]
    fn test_normalize_bytes_is_deterministic() {
        let input = png_bytes(900, 300);
        let (a, _, _) = normalize_bytes(&input, 800, 0.7).unwrap();
        let (b, _, _) = normalize_bytes(&input, 800, 0.7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_bytes_idempotent_bound() {
        let (first, _, _) = normalize_bytes(&png_bytes(2000, 1500), 800, 0.7).unwrap();
        let (second, width, height) = normalize_bytes(&first, 800, 0.7).unwrap();
        assert!(width.max(height) <= 800);
        assert_eq!((width, height), (800, 600));
        assert!(image::load_from_memory(&second).is_ok());
    }

    #[test]
    fn test_normalize_bytes_rejects_garbage() {
        let err = normalize_bytes(b"definitely not an image", 800, 0.7).unwrap_err();
        assert!(matches!(err, NormalizeError::Unreadable { .. }));
    }

    #[test]
    fn test_normalize_bytes_names_non_image_type() {
        let pdf = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n1 0 obj\n<<>>\nendobj\n";
        let err = normalize_bytes(pdf, 800, 0.7).unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[tokio::test]
    async fn test_normalize_writes_output_file() {
        let dir = tempdir().unwrap();
        let raw_path = dir.path().join("IMG_0001.png");
        std::fs::write(&raw_path, png_bytes(1600, 1200)).unwrap();
        let raw = ImageHandle::open(&raw_path).await.unwrap();

        let normalizer = ImageNormalizer::new(dir.path().join("work"));
        let normalized = normalizer.normalize(&raw).await.unwrap();

        assert_eq!((normalized.width, normalized.height), (800, 600));
        assert_eq!(normalized.long_edge(), 800);
        assert!((normalized.quality - 0.7).abs() < f32::EPSILON);
        assert!(normalized.location.exists());
        assert_eq!(normalized.location.file_name(), Some("IMG_0001.normalized.jpg"));
        // The raw capture is left alone
        assert!(raw_path.exists());
    }

    #[tokio::test]
    async fn test_normalize_corrupt_file_reports_path() {
        let dir = tempdir().unwrap();
        let raw_path = dir.path().join("broken.jpg");
        std::fs::write(&raw_path, b"\xff\xd8\xff garbage").unwrap();
        let raw = ImageHandle::open(&raw_path).await.unwrap();

        let normalizer = ImageNormalizer::new(dir.path().join("work"));
        match normalizer.normalize(&raw).await {
            Err(NormalizeError::Unreadable { path, .. }) => assert_eq!(path, raw_path),
            other => panic!("expected unreadable error, got {:?}", other),
        }
        assert!(!dir.path().join("work").join("broken.normalized.jpg").exists());
    }
}
