//! sheetcap 도메인 모델.
//!
//! 격자선, 셀 박스, 추출된 표 등 크레이트 간 공유하는 데이터 구조체를 정의한다.

pub mod grid;
pub mod table;
