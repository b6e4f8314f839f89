//! 클립보드 포트.
//!
//! 구분자 텍스트를 시스템 클립보드에 기록하는 인터페이스.
//! 구현: `sheetcap-app::clipboard::SystemClipboard` (arboard)

use crate::error::CoreError;

/// 클립보드 쓰기
pub trait ClipboardSink: Send + Sync {
    /// 텍스트를 클립보드에 기록
    fn write_text(&self, text: &str) -> Result<(), CoreError>;
}
