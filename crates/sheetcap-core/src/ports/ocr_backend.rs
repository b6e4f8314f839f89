//! OCR 백엔드 포트.
//!
//! 로컬 ONNX 모델, 로컬 신경망 모델, 외부 Tesseract 바이너리를 같은 인터페이스로 추상화한다.
//! 구현: `sheetcap-vision::ocr` (OnnxBackend, NeuralBackend, ExternalBinaryBackend)

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// 백엔드 종류 — 설정에서 캐스케이드 순서를 지정할 때 사용
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// 로컬 ONNX 검출+인식 모델 쌍
    Onnx,
    /// 로컬 신경망 모델 (별도 모델 디렉토리)
    Neural,
    /// 외부 OCR 실행 파일 (tesseract)
    ExternalBinary,
}

impl BackendKind {
    /// 기본 캐스케이드 순서
    pub fn default_order() -> Vec<BackendKind> {
        vec![
            BackendKind::Onnx,
            BackendKind::Neural,
            BackendKind::ExternalBinary,
        ]
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Onnx => write!(f, "onnx"),
            BackendKind::Neural => write!(f, "neural"),
            BackendKind::ExternalBinary => write!(f, "external_binary"),
        }
    }
}

/// OCR 백엔드 — 셀 이미지 한 장에서 텍스트 인식
///
/// 생성된 인스턴스는 읽기 전용 capability 객체로 취급되며,
/// 여러 워커 스레드에서 동시에 `recognize`를 호출할 수 있어야 한다.
pub trait OcrBackend: Send + Sync {
    /// 백엔드 이름 (로그용, 예: "onnx-ppocr", "tesseract")
    fn name(&self) -> &str;

    /// 백엔드 종류
    fn kind(&self) -> BackendKind;

    /// 현재 사용 가능한지 여부 (false면 캐스케이드가 건너뜀)
    fn is_available(&self) -> bool {
        true
    }

    /// 셀 이미지에서 텍스트 인식. 인식된 텍스트가 없으면 빈 문자열.
    fn recognize(&self, patch: &DynamicImage) -> Result<String, OcrError>;
}

/// 백엔드 생성자 — 모델/실행 파일을 탐색해 인스턴스를 만든다
///
/// 모델 파일이 없거나 feature가 꺼져 있으면 `None` (사용 불가, 에러 아님).
pub trait BackendProvider: Send + Sync {
    /// 생성할 백엔드 종류
    fn kind(&self) -> BackendKind;

    /// 백엔드 생성 시도. 비용이 큰 모델 로드가 여기서 일어난다.
    fn try_construct(&self) -> Option<Arc<dyn OcrBackend>>;
}
