//! OCR 백엔드 어댑터와 캐스케이드.
//!
//! - [`onnx`] — 로컬 ONNX 검출/인식 모델 (`onnx` feature)
//! - [`neural`] — 로컬 ocrs 모델 (`neural` feature)
//! - [`external`] — 외부 tesseract 실행 파일
//! - [`registry`] — 백엔드 지연 생성 + 프로세스 전역 인스턴스
//! - [`cascade`] — 우선순위 순 시도, 첫 비어 있지 않은 결과 채택

pub mod cascade;
pub mod external;
pub mod neural;
pub mod onnx;
pub mod registry;

pub use cascade::{CellRecognition, OcrCascade};
pub use registry::BackendRegistry;
