//! 표 조립.
//!
//! 셀 박스를 행 우선 순서로 방문하며 잘라낸 이미지를 OCR 캐스케이드에 넘기고,
//! 행 인덱스가 바뀔 때마다 한 행을 완성한다. 워커 스레드에서 순차 실행된다.

use std::collections::BTreeMap;

use image::DynamicImage;
use sheetcap_core::error::ExtractionError;
use sheetcap_core::models::grid::CellBox;
use sheetcap_core::models::table::Table;
use tracing::debug;

use crate::ocr::OcrCascade;

/// 셀 박스 목록 → 표
///
/// 넓이 0 셀은 OCR 없이 빈 문자열. 셀 목록이 직사각형이 아니면 `Extraction` 에러.
pub fn assemble(
    image: &DynamicImage,
    cells: &[CellBox],
    cascade: &OcrCascade,
) -> Result<Table, ExtractionError> {
    let column_count = cells.iter().map(|c| c.col + 1).max().unwrap_or(0);
    let mut table = Table::new(column_count);
    let mut row: Vec<String> = Vec::with_capacity(column_count);
    let mut current_row: Option<usize> = None;
    let mut provenance: BTreeMap<String, usize> = BTreeMap::new();

    for cell in cells {
        if current_row.is_some_and(|r| r != cell.row) {
            finish_row(&mut table, &mut row, current_row)?;
        }
        current_row = Some(cell.row);

        if cell.is_empty() {
            row.push(String::new());
            continue;
        }

        let patch = image.crop_imm(cell.x, cell.y, cell.width, cell.height);
        let recognition = cascade.recognize_cell_detailed(&patch);
        if let Some(kind) = recognition.backend {
            *provenance.entry(kind.to_string()).or_default() += 1;
        }
        row.push(recognition.text);
    }
    if !row.is_empty() {
        finish_row(&mut table, &mut row, current_row)?;
    }

    debug!(
        "표 조립 완료: {}행 x {}열, 백엔드별 인식 셀 {:?}",
        table.row_count(),
        table.column_count(),
        provenance
    );
    Ok(table)
}

fn finish_row(
    table: &mut Table,
    row: &mut Vec<String>,
    index: Option<usize>,
) -> Result<(), ExtractionError> {
    table.push_row(std::mem::take(row))?;
    if let Some(index) = index {
        debug!("행 {} 인식 완료", index);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcap_core::error::OcrError;
    use sheetcap_core::models::grid::GridLines;
    use sheetcap_core::ports::ocr_backend::{BackendKind, OcrBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::segmenter::segment;

    /// 셀 크기를 텍스트로 돌려주는 백엔드
    struct SizeBackend {
        calls: AtomicUsize,
    }

    impl OcrBackend for SizeBackend {
        fn name(&self) -> &str {
            "size"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Onnx
        }

        fn recognize(&self, patch: &DynamicImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}x{}", patch.width(), patch.height()))
        }
    }

    fn cascade() -> (OcrCascade, Arc<SizeBackend>) {
        let backend = Arc::new(SizeBackend {
            calls: AtomicUsize::new(0),
        });
        (OcrCascade::new(vec![backend.clone()]), backend)
    }

    #[test]
    fn rows_follow_grid() {
        let image = DynamicImage::new_rgb8(100, 60);
        let grid = GridLines::new(vec![0, 40, 99], vec![0, 20, 59], 100, 60).unwrap();
        let cells = segment(&grid, 2);
        let (cascade, backend) = cascade();

        let table = assemble(&image, &cells, &cascade).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.cell(0, 0), Some("36x16"));
        assert_eq!(table.cell(1, 1), Some("55x35"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn empty_cells_skip_ocr() {
        let image = DynamicImage::new_rgb8(100, 60);
        let grid = GridLines::new(vec![0, 3, 50], vec![0, 30], 100, 60).unwrap();
        let cells = segment(&grid, 2);
        let (cascade, backend) = cascade();

        let table = assemble(&image, &cells, &cascade).unwrap();

        assert_eq!(table.rows(), &[vec![String::new(), "43x26".to_string()]]);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_backends_gives_blank_table() {
        let image = DynamicImage::new_rgb8(50, 50);
        let grid = GridLines::new(vec![0, 25, 49], vec![0, 25, 49], 50, 50).unwrap();
        let cells = segment(&grid, 2);

        let table = assemble(&image, &cells, &OcrCascade::empty()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert!(table.is_blank());
    }

    #[test]
    fn ragged_cell_list_rejected() {
        let image = DynamicImage::new_rgb8(50, 50);
        let cell = |row, col| CellBox {
            row,
            col,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        };
        let cells = [cell(0, 0), cell(0, 1), cell(1, 0)];

        let err = assemble(&image, &cells, &OcrCascade::empty()).unwrap_err();
        assert!(matches!(err, ExtractionError::Extraction(_)));
    }

    #[test]
    fn no_cells_gives_empty_table() {
        let image = DynamicImage::new_rgb8(10, 10);
        let table = assemble(&image, &[], &OcrCascade::empty()).unwrap();
        assert_eq!(table.row_count(), 0);
    }
}
