//! 입력 이미지 디코딩.
//!
//! 래스터 파일을 통째로 메모리에 디코딩한다. 포맷은 확장자가 아니라 내용으로 판별.

use std::path::Path;

use image::{DynamicImage, ImageReader};
use sheetcap_core::error::ExtractionError;
use tracing::debug;

/// 파일 경로에서 이미지 로드
pub fn load_image(path: &Path) -> Result<DynamicImage, ExtractionError> {
    let decode_err = |reason: String| ExtractionError::ImageDecode {
        path: path.display().to_string(),
        reason,
    };

    let reader = ImageReader::open(path)
        .map_err(|e| decode_err(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?;
    let image = reader.decode().map_err(|e| decode_err(e.to_string()))?;

    debug!(
        "이미지 로드: {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::fs;

    #[test]
    fn missing_file_is_decode_error() {
        let err = load_image(Path::new("/nonexistent/sheetcap/table.png")).unwrap_err();
        assert!(matches!(err, ExtractionError::ImageDecode { .. }));
    }

    #[test]
    fn format_guessed_from_content() {
        let dir = tempfile::tempdir().unwrap();
        // 확장자와 실제 포맷이 달라도 디코딩된다
        let path = dir.path().join("table.jpg");
        RgbImage::from_pixel(8, 4, Rgb([255, 255, 255]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!((image.width(), image.height()), (8, 4));
    }

    #[test]
    fn garbage_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.png");
        fs::write(&path, b"not an image").unwrap();

        match load_image(&path).unwrap_err() {
            ExtractionError::ImageDecode { path: reported, .. } => {
                assert_eq!(reported, path.display().to_string())
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
