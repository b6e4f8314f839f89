//! 구분자 텍스트 직렬화.
//!
//! 스프레드시트에 그대로 붙여넣을 수 있도록 열은 탭, 행은 줄바꿈으로 구분한다.

use sheetcap_core::error::ExtractionError;
use sheetcap_core::models::table::Table;

/// 열 구분자
pub const COLUMN_DELIMITER: char = '\t';

/// 행 구분자
pub const ROW_DELIMITER: char = '\n';

/// 표 → 탭/줄바꿈 구분 텍스트 (끝 줄바꿈 없음)
///
/// 셀 안의 탭, 줄바꿈, 캐리지 리턴은 공백 하나로 치환해 행/열 수를 보존한다.
pub fn to_delimited_text(table: &Table) -> String {
    table
        .rows()
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| sanitize_cell(cell))
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 구분 텍스트 → 표
///
/// 행 너비가 서로 다르면 `ExtractionError::Extraction`. 빈 문자열은 빈 표.
pub fn parse_delimited_text(text: &str) -> Result<Table, ExtractionError> {
    if text.is_empty() {
        return Ok(Table::default());
    }
    let rows = text
        .split(ROW_DELIMITER)
        .map(|line| line.split(COLUMN_DELIMITER).map(str::to_string).collect())
        .collect();
    Table::from_rows(rows)
}

fn sanitize_cell(cell: &str) -> String {
    cell.replace(['\t', '\n', '\r'], " ")
}
