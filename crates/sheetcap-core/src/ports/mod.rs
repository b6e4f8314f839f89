//! 포트 인터페이스 (trait).
//!
//! Hexagonal Architecture의 포트 레이어.
//! `sheetcap-vision`이 OCR 백엔드를, `sheetcap-app`이 클립보드를 구현하며
//! 오케스트레이터에서 `Arc<dyn T>`로 와이어링한다.
//!
//! 워커 스레드에서 블로킹으로 호출되므로 모든 trait은 동기 메서드만 가진다.

pub mod clipboard;
pub mod ocr_backend;
