//! 시스템 클립보드 어댑터 (arboard).
//!
//! `arboard::Clipboard`는 플랫폼에 따라 Send가 아니므로 쓰기마다 새로 연다.
//! Linux(X11/Wayland)에서는 클립보드 소유 프로세스가 종료되면 내용이 사라질 수 있다.

use sheetcap_core::error::CoreError;
use sheetcap_core::ports::clipboard::ClipboardSink;
use tracing::debug;

/// arboard 기반 시스템 클립보드
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    pub fn new() -> Self {
        Self
    }
}

impl ClipboardSink for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), CoreError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| CoreError::Clipboard(format!("클립보드 열기 실패: {e}")))?;
        clipboard
            .set_text(text.to_owned())
            .map_err(|e| CoreError::Clipboard(format!("클립보드 쓰기 실패: {e}")))?;
        debug!("시스템 클립보드에 {}자 기록", text.chars().count());
        Ok(())
    }
}
