//! Shared helpers for cloud recognition backends.

use base64::Engine;

use super::backend::RecognitionError;
use crate::models::ImageHandle;

/// Candidate languages sent with every request, in priority order.
pub const DEFAULT_LANGUAGE_HINTS: &[&str] = &["es", "en", "fr", "de", "it", "pt"];

/// Read an image and encode it as base64, returning (base64_data, mime_type).
pub async fn encode_image_base64(
    image: &ImageHandle,
) -> Result<(String, &'static str), RecognitionError> {
    let image_bytes = image.read().await?;
    let base64_data = base64::engine::general_purpose::STANDARD.encode(&image_bytes);

    let mime_type = infer::get(&image_bytes)
        .map(|kind| kind.mime_type())
        .filter(|mime| mime.starts_with("image/"))
        .unwrap_or("image/jpeg");

    Ok((base64_data, mime_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_encode_image_base64() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        std::fs::write(&path, b"hello").unwrap();
        let handle = ImageHandle::open(&path).await.unwrap();

        let (data, mime) = encode_image_base64(&handle).await.unwrap();
        assert_eq!(data, "aGVsbG8=");
        // Unrecognized content falls back to JPEG
        assert_eq!(mime, "image/jpeg");
    }

    #[tokio::test]
    async fn test_encode_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let handle = ImageHandle::from_parts(dir.path().join("missing.jpg"), 0);
        assert!(matches!(
            encode_image_base64(&handle).await,
            Err(RecognitionError::Io(_))
        ));
    }
}
