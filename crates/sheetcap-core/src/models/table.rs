//! 추출된 표 모델.

use serde::{Deserialize, Serialize};

use crate::error::ExtractionError;

/// 직사각형 문자열 행렬
///
/// 모든 행은 정확히 `column_count`개의 셀을 가진다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    column_count: usize,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// 열 수를 고정한 빈 표 생성
    pub fn new(column_count: usize) -> Self {
        Self {
            column_count,
            rows: Vec::new(),
        }
    }

    /// 행 배열로부터 생성 (모든 행의 너비가 같아야 함)
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self, ExtractionError> {
        let column_count = rows.first().map_or(0, Vec::len);
        let mut table = Self::new(column_count);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// 행 추가
    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), ExtractionError> {
        if row.len() != self.column_count {
            return Err(ExtractionError::Extraction(format!(
                "행 너비 불일치: 기대 {}열, 실제 {}열",
                self.column_count,
                row.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// 열 수
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// 행 수
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 전체 행
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// (row, col) 셀 텍스트
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows.get(row)?.get(col).map(String::as_str)
    }

    /// 모든 셀이 비어 있는지 (OCR 백엔드가 하나도 없을 때 등)
    pub fn is_blank(&self) -> bool {
        self.rows.iter().flatten().all(|c| c.is_empty())
    }

    /// 행 벡터로 변환
    pub fn into_rows(self) -> Vec<Vec<String>> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn push_row_enforces_width() {
        let mut table = Table::new(2);
        table.push_row(row(&["a", "b"])).unwrap();
        let err = table.push_row(row(&["c"])).unwrap_err();
        assert!(err.to_string().contains("행 너비 불일치"));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn from_rows_and_lookup() {
        let table = Table::from_rows(vec![row(&["이름", "수량"]), row(&["사과", "3"])]).unwrap();
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.cell(1, 0), Some("사과"));
        assert_eq!(table.cell(2, 0), None);
        assert!(!table.is_blank());
    }

    #[test]
    fn blank_table() {
        let table = Table::from_rows(vec![row(&["", ""]), row(&["", ""])]).unwrap();
        assert!(table.is_blank());
    }

    #[test]
    fn table_serde_roundtrip() {
        let table = Table::from_rows(vec![row(&["a", "b"])]).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: Table = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
