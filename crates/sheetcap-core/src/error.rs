//! sheetcap 에러 타입.
//!
//! 구조적 실패(격자 미발견 등)와 셀 단위 인식 실패를 서로 다른 타입으로 분리한다.
//! `ExtractionError`만 오케스트레이터 경계를 넘고, `OcrError`는 캐스케이드 내부에서 소멸한다.

use thiserror::Error;

/// 표 추출 파이프라인 에러.
///
/// 오케스트레이터의 `Failed` 상태에 그대로 실리므로 `Clone`이 가능하도록
/// 원인을 문자열로 보관한다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// 입력 이미지를 읽거나 디코딩할 수 없음 (재시도 없음)
    #[error("이미지 디코딩 실패: {path}: {reason}")]
    ImageDecode {
        /// 입력 경로 또는 메모리 입력 라벨
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 어느 한 축에서든 격자선이 2개 미만
    #[error("표 격자선을 찾을 수 없음: 세로선 {columns}개, 가로선 {rows}개 (축마다 2개 이상 필요)")]
    NoGridDetected {
        /// 검출된 세로선(열 경계) 수
        columns: usize,
        /// 검출된 가로선(행 경계) 수
        rows: usize,
    },

    /// 그 밖의 격자 검출/셀 분할/조립 실패
    #[error("표 추출 실패: {0}")]
    Extraction(String),
}

/// OCR 백엔드 에러.
///
/// 캐스케이드가 `warn` 로그만 남기고 빈 결과로 취급한다.
#[derive(Debug, Error)]
pub enum OcrError {
    /// 모델 파일 로드 실패
    #[error("OCR 모델 로드 실패: {0}")]
    ModelLoad(String),

    /// 추론 실패
    #[error("OCR 추론 실패: {0}")]
    Inference(String),

    /// 외부 프로세스 실행 실패
    #[error("OCR 프로세스 실패: {0}")]
    Process(String),

    /// 빈 이미지 입력
    #[error("빈 이미지: 너비 또는 높이가 0")]
    EmptyImage,

    /// I/O 에러
    #[error("OCR I/O 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 코어 레이어 에러 (설정 파일, 클립보드 포트).
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON 직렬화/역직렬화 실패
    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 설정값 오류
    #[error("설정 에러: {0}")]
    Config(String),

    /// I/O 에러
    #[error("I/O 에러: {0}")]
    Io(#[from] std::io::Error),

    /// 클립보드 쓰기 실패
    #[error("클립보드 에러: {0}")]
    Clipboard(String),
}
