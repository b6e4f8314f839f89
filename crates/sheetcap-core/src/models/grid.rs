//! 표 격자 모델.
//!
//! 격자선 좌표(`GridLines`)와 그로부터 파생되는 셀 박스(`CellBox`)를 정의한다.

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// 검출된 표 격자선 좌표
///
/// `columns`는 세로선의 x 좌표, `rows`는 가로선의 y 좌표이며 모두 오름차순이다.
/// 축마다 2개 이상이어야 하므로 `GridLines::new`로만 생성한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridLines {
    columns: Vec<u32>,
    rows: Vec<u32>,
    width: u32,
    height: u32,
}

impl GridLines {
    /// 격자선 검증 후 생성
    ///
    /// - 어느 축이든 2개 미만이면 `NoGridDetected`
    /// - 오름차순이 아니거나 이미지 밖 좌표면 `Extraction`
    pub fn new(
        columns: Vec<u32>,
        rows: Vec<u32>,
        width: u32,
        height: u32,
    ) -> Result<Self, ExtractionError> {
        if columns.len() < 2 || rows.len() < 2 {
            return Err(ExtractionError::NoGridDetected {
                columns: columns.len(),
                rows: rows.len(),
            });
        }
        if !is_strictly_ascending(&columns) || !is_strictly_ascending(&rows) {
            return Err(ExtractionError::Extraction(
                "격자선 좌표가 오름차순이 아님".to_string(),
            ));
        }
        let out_of_bounds = columns.last().is_some_and(|&x| x >= width)
            || rows.last().is_some_and(|&y| y >= height);
        if out_of_bounds {
            return Err(ExtractionError::Extraction(format!(
                "격자선 좌표가 이미지 범위({width}x{height})를 벗어남"
            )));
        }

        Ok(Self {
            columns,
            rows,
            width,
            height,
        })
    }

    /// 세로선 x 좌표
    pub fn columns(&self) -> &[u32] {
        &self.columns
    }

    /// 가로선 y 좌표
    pub fn rows(&self) -> &[u32] {
        &self.rows
    }

    /// 원본 이미지 크기 (width, height)
    pub fn image_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 셀 행 수 (가로선 수 - 1)
    pub fn row_count(&self) -> usize {
        self.rows.len() - 1
    }

    /// 셀 열 수 (세로선 수 - 1)
    pub fn column_count(&self) -> usize {
        self.columns.len() - 1
    }
}

fn is_strictly_ascending(values: &[u32]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}

/// 셀 하나의 위치와 패딩 적용된 크롭 영역
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBox {
    /// 행 인덱스 (0 기반)
    pub row: usize,
    /// 열 인덱스 (0 기반)
    pub col: usize,
    /// 크롭 영역 좌상단 X
    pub x: u32,
    /// 크롭 영역 좌상단 Y
    pub y: u32,
    /// 크롭 영역 너비 (0 가능)
    pub width: u32,
    /// 크롭 영역 높이 (0 가능)
    pub height: u32,
}

impl CellBox {
    /// 크롭할 픽셀이 없는 셀 (격자선 간격이 패딩의 2배 이하)
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}
