//! # sheetcap-app
//!
//! 표 이미지 추출 진입점.
//! 워커 스레드 기반 오케스트레이터, 시스템 클립보드 어댑터, CLI 바이너리.

pub mod clipboard;
pub mod orchestrator;

pub use clipboard::SystemClipboard;
pub use orchestrator::{
    ExtractionOrchestrator, ExtractionOutcome, ExtractionSource, ExtractionState,
    OrchestratorBuilder, SubmitError,
};
