//! 셀 분할.
//!
//! 인접한 가로선 쌍 × 세로선 쌍마다 셀 하나를 만들고,
//! 격자선 자체가 OCR에 섞이지 않도록 안쪽으로 패딩을 준다.

use sheetcap_core::models::grid::{CellBox, GridLines};

/// 격자선 → 셀 박스 목록 (행 우선 순서)
///
/// 결과는 정확히 `(rows - 1) * (columns - 1)`개. 패딩 적용 후 이미지 범위로 잘리며,
/// 선 간격이 `2 * padding` 이하인 셀은 넓이 0 박스가 된다.
pub fn segment(grid: &GridLines, padding: u32) -> Vec<CellBox> {
    let (width, height) = grid.image_size();
    let mut cells = Vec::with_capacity(grid.row_count() * grid.column_count());

    for (row, ys) in grid.rows().windows(2).enumerate() {
        let (y, cell_height) = padded_span(ys[0], ys[1], padding, height);
        for (col, xs) in grid.columns().windows(2).enumerate() {
            let (x, cell_width) = padded_span(xs[0], xs[1], padding, width);
            cells.push(CellBox {
                row,
                col,
                x,
                y,
                width: cell_width,
                height: cell_height,
            });
        }
    }

    cells
}

/// `[start + padding, end - padding)`을 `[0, limit]`로 자른 (시작, 길이)
fn padded_span(start: u32, end: u32, padding: u32, limit: u32) -> (u32, u32) {
    let lo = start.saturating_add(padding).min(limit);
    let hi = end.saturating_sub(padding).min(limit);
    (lo, hi.saturating_sub(lo))
}
