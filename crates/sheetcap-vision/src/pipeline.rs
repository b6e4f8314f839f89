//! 동기 표 추출 파이프라인.
//!
//! 격자 검출 → 셀 분할 → 표 조립을 한 번에 수행한다.
//! 호출 스레드를 블로킹하므로 오케스트레이터의 워커 스레드에서 사용한다.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use sheetcap_core::config::{AppConfig, GridDetectionConfig, SegmentConfig};
use sheetcap_core::error::ExtractionError;
use sheetcap_core::models::table::Table;
use tracing::debug;

use crate::assembler::assemble;
use crate::grid_detector::detect_grid;
use crate::image_source::load_image;
use crate::ocr::BackendRegistry;
use crate::segmenter::segment;

/// 이미지 → 표 추출기
#[derive(Debug, Clone)]
pub struct TableExtractor {
    grid: GridDetectionConfig,
    segment: SegmentConfig,
    registry: Arc<BackendRegistry>,
}

impl TableExtractor {
    /// 설정과 OCR 백엔드 레지스트리로 생성
    pub fn new(config: &AppConfig, registry: Arc<BackendRegistry>) -> Self {
        Self {
            grid: config.grid.clone(),
            segment: config.segment.clone(),
            registry,
        }
    }

    /// 사용 중인 레지스트리
    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// 디코딩된 이미지에서 표 추출
    ///
    /// OCR 캐스케이드는 최초 호출 시 레지스트리에서 한 번 구성된다.
    pub fn extract(&self, image: &DynamicImage) -> Result<Table, ExtractionError> {
        let start = Instant::now();

        let grid = detect_grid(image, &self.grid)?;
        let cells = segment(&grid, self.segment.cell_padding);
        debug!(
            "셀 분할: {}행 x {}열 = {}개",
            grid.row_count(),
            grid.column_count(),
            cells.len()
        );

        let cascade = self.registry.cascade();
        let table = assemble(image, &cells, &cascade)?;

        debug!("표 추출 소요: {:?}", start.elapsed());
        Ok(table)
    }

    /// 파일을 디코딩한 뒤 표 추출
    pub fn extract_file(&self, path: &Path) -> Result<Table, ExtractionError> {
        let image = load_image(path)?;
        self.extract(&image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use sheetcap_core::error::OcrError;
    use sheetcap_core::ports::ocr_backend::{BackendKind, BackendProvider, OcrBackend};

    struct EchoBackend;

    impl OcrBackend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Neural
        }

        fn recognize(&self, _patch: &DynamicImage) -> Result<String, OcrError> {
            Ok("셀\t값".to_string())
        }
    }

    struct EchoProvider;

    impl BackendProvider for EchoProvider {
        fn kind(&self) -> BackendKind {
            BackendKind::Neural
        }

        fn try_construct(&self) -> Option<Arc<dyn OcrBackend>> {
            Some(Arc::new(EchoBackend))
        }
    }

    fn grid_image() -> DynamicImage {
        let mut img = RgbImage::from_pixel(300, 200, Rgb([255, 255, 255]));
        for &y in &[20u32, 100, 180] {
            for x in 20..282 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
                img.put_pixel(x, y + 1, Rgb([0, 0, 0]));
            }
        }
        for &x in &[20u32, 150, 280] {
            for y in 20..182 {
                img.put_pixel(x, y, Rgb([0, 0, 0]));
                img.put_pixel(x + 1, y, Rgb([0, 0, 0]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn extracts_table_from_grid() {
        let registry = Arc::new(BackendRegistry::new(vec![Box::new(EchoProvider)]));
        let extractor = TableExtractor::new(&AppConfig::default(), registry.clone());

        let table = extractor.extract(&grid_image()).unwrap();

        assert_eq!((table.row_count(), table.column_count()), (2, 2));
        assert_eq!(table.cell(1, 1), Some("셀\t값"));
        assert_eq!(registry.constructed_kinds(), vec![BackendKind::Neural]);
    }

    #[test]
    fn no_grid_fails_before_ocr() {
        let registry = Arc::new(BackendRegistry::new(vec![Box::new(EchoProvider)]));
        let extractor = TableExtractor::new(&AppConfig::default(), registry.clone());
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(80, 80, Rgb([255, 255, 255])));

        let err = extractor.extract(&blank).unwrap_err();
        assert!(matches!(err, ExtractionError::NoGridDetected { .. }));
        assert!(registry.constructed_kinds().is_empty());
    }

    #[test]
    fn missing_file_is_decode_error() {
        let registry = Arc::new(BackendRegistry::new(Vec::new()));
        let extractor = TableExtractor::new(&AppConfig::default(), registry);

        let err = extractor
            .extract_file(Path::new("/nonexistent/sheet.png"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::ImageDecode { .. }));
    }
}
