//! OCR 캐스케이드.
//!
//! 사용 가능한 백엔드를 우선순위대로 시도하고, 공백을 제거한 결과가
//! 처음으로 비어 있지 않은 백엔드의 텍스트를 채택한다. 이후 백엔드는 호출하지 않는다.
//! 백엔드 에러는 `warn` 로그만 남기고 빈 결과로 취급한다.

use std::fmt;
use std::sync::Arc;

use image::DynamicImage;
use sheetcap_core::ports::ocr_backend::{BackendKind, OcrBackend};
use tracing::{trace, warn};

/// 셀 하나의 인식 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellRecognition {
    /// 인식된 텍스트 (없으면 빈 문자열)
    pub text: String,
    /// 텍스트를 만든 백엔드 (없으면 None)
    pub backend: Option<BackendKind>,
}

/// 순서가 고정된 OCR 백엔드 목록
#[derive(Clone, Default)]
pub struct OcrCascade {
    backends: Vec<Arc<dyn OcrBackend>>,
}

impl OcrCascade {
    /// 우선순위 순서의 백엔드 목록으로 생성
    pub fn new(backends: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self { backends }
    }

    /// 백엔드가 하나도 없는 캐스케이드 (모든 셀이 빈 문자열)
    pub fn empty() -> Self {
        Self::default()
    }

    /// 백엔드 수
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// 백엔드가 없는지
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// 구성된 백엔드 종류 (우선순위 순)
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    /// 셀 텍스트 인식 — 실패는 빈 문자열
    pub fn recognize_cell(&self, patch: &DynamicImage) -> String {
        self.recognize_cell_detailed(patch).text
    }

    /// 셀 텍스트 인식 + 채택된 백엔드
    pub fn recognize_cell_detailed(&self, patch: &DynamicImage) -> CellRecognition {
        for backend in &self.backends {
            if !backend.is_available() {
                trace!("OCR 백엔드 건너뜀 (사용 불가): {}", backend.name());
                continue;
            }

            match backend.recognize(patch) {
                Ok(text) => {
                    let text = text.trim();
                    if !text.is_empty() {
                        return CellRecognition {
                            text: text.to_string(),
                            backend: Some(backend.kind()),
                        };
                    }
                }
                Err(e) => {
                    warn!("OCR 백엔드 실패, 다음 백엔드로 진행: {}: {}", backend.name(), e);
                }
            }
        }

        CellRecognition::default()
    }
}

impl fmt::Debug for OcrCascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetcap_core::error::OcrError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Text(&'static str),
        Fail,
    }

    struct ScriptedBackend {
        kind: BackendKind,
        available: bool,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(kind: BackendKind, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: true,
                reply,
                calls: AtomicUsize::new(0),
            })
        }

        fn unavailable(kind: BackendKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                available: false,
                reply: Reply::Text("never"),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OcrBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn recognize(&self, _patch: &DynamicImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Fail => Err(OcrError::Inference("scripted failure".to_string())),
            }
        }
    }

    fn patch() -> DynamicImage {
        DynamicImage::new_rgb8(16, 8)
    }

    #[test]
    fn first_non_empty_wins() {
        let first = ScriptedBackend::new(BackendKind::Onnx, Reply::Text("X"));
        let second = ScriptedBackend::new(BackendKind::ExternalBinary, Reply::Text("Y"));
        let cascade = OcrCascade::new(vec![first.clone(), second.clone()]);

        let result = cascade.recognize_cell_detailed(&patch());
        assert_eq!(result.text, "X");
        assert_eq!(result.backend, Some(BackendKind::Onnx));
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[test]
    fn whitespace_only_falls_through() {
        let first = ScriptedBackend::new(BackendKind::Onnx, Reply::Text("  \n\t"));
        let second = ScriptedBackend::new(BackendKind::Neural, Reply::Text(" 42 \n"));
        let cascade = OcrCascade::new(vec![first.clone(), second]);

        let result = cascade.recognize_cell_detailed(&patch());
        assert_eq!(result.text, "42");
        assert_eq!(result.backend, Some(BackendKind::Neural));
        assert_eq!(first.calls(), 1);
    }

    #[test]
    fn errors_are_treated_as_empty() {
        let failing = ScriptedBackend::new(BackendKind::Onnx, Reply::Fail);
        let fallback = ScriptedBackend::new(BackendKind::ExternalBinary, Reply::Text("ok"));
        let cascade = OcrCascade::new(vec![failing, fallback]);

        assert_eq!(cascade.recognize_cell(&patch()), "ok");
    }

    #[test]
    fn unavailable_backends_are_skipped() {
        let skipped = ScriptedBackend::unavailable(BackendKind::Onnx);
        let used = ScriptedBackend::new(BackendKind::Neural, Reply::Text("n"));
        let cascade = OcrCascade::new(vec![skipped.clone(), used]);

        assert_eq!(cascade.recognize_cell(&patch()), "n");
        assert_eq!(skipped.calls(), 0);
    }

    #[test]
    fn total_failure_is_empty_string() {
        let a = ScriptedBackend::new(BackendKind::Onnx, Reply::Fail);
        let b = ScriptedBackend::new(BackendKind::Neural, Reply::Text(""));
        let cascade = OcrCascade::new(vec![a, b]);

        assert_eq!(cascade.recognize_cell_detailed(&patch()), CellRecognition::default());
        assert_eq!(OcrCascade::empty().recognize_cell(&patch()), "");
    }

    #[test]
    fn kinds_follow_priority() {
        let cascade = OcrCascade::new(vec![
            ScriptedBackend::new(BackendKind::ExternalBinary, Reply::Fail),
            ScriptedBackend::new(BackendKind::Onnx, Reply::Fail),
        ]);
        assert_eq!(
            cascade.kinds(),
            vec![BackendKind::ExternalBinary, BackendKind::Onnx]
        );
        assert_eq!(cascade.len(), 2);
    }
}
