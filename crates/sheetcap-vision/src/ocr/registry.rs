//! OCR 백엔드 레지스트리.
//!
//! 백엔드 생성(모델 로드, 실행 파일 탐색)은 비용이 크므로 provider마다
//! `OnceCell` 슬롯 하나를 두어 최초 요청 시 한 번만 생성한다.
//! 동시에 여러 스레드가 요청해도 초기화는 잠금으로 보호되어 한 번만 일어난다.
//! 프로세스 전역 인스턴스는 `BackendRegistry::shared`로 얻는다.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use sheetcap_core::config::OcrConfig;
use sheetcap_core::ports::ocr_backend::{BackendKind, BackendProvider, OcrBackend};
use tracing::{debug, info, warn};

use super::cascade::OcrCascade;
use super::external::ExternalBinaryProvider;
use super::neural::NeuralProvider;
use super::onnx::OnnxProvider;

/// 프로세스 전역 레지스트리 (최초 설정이 사용됨)
static SHARED: OnceCell<Arc<BackendRegistry>> = OnceCell::new();

struct BackendSlot {
    provider: Box<dyn BackendProvider>,
    instance: OnceCell<Option<Arc<dyn OcrBackend>>>,
}

impl BackendSlot {
    fn get(&self) -> Option<Arc<dyn OcrBackend>> {
        self.instance
            .get_or_init(|| {
                let kind = self.provider.kind();
                let backend = self.provider.try_construct();
                match &backend {
                    Some(b) => info!("OCR 백엔드 생성: {} ({})", b.name(), kind),
                    None => debug!("OCR 백엔드 사용 불가: {}", kind),
                }
                backend
            })
            .clone()
    }
}

/// 우선순위 순서의 백엔드 슬롯 모음
pub struct BackendRegistry {
    slots: Vec<BackendSlot>,
    cascade: OnceCell<Arc<OcrCascade>>,
}

impl BackendRegistry {
    /// provider 목록(우선순위 순)으로 생성. 같은 종류가 중복되면 앞의 것만 사용.
    pub fn new(providers: Vec<Box<dyn BackendProvider>>) -> Self {
        let mut slots: Vec<BackendSlot> = Vec::with_capacity(providers.len());
        for provider in providers {
            if slots.iter().any(|s| s.provider.kind() == provider.kind()) {
                warn!("중복된 OCR 백엔드 종류 무시: {}", provider.kind());
                continue;
            }
            slots.push(BackendSlot {
                provider,
                instance: OnceCell::new(),
            });
        }

        Self {
            slots,
            cascade: OnceCell::new(),
        }
    }

    /// 설정의 `backend_order` 순서로 기본 provider 구성
    pub fn from_config(config: &OcrConfig) -> Self {
        let providers = config
            .backend_order
            .iter()
            .map(|kind| -> Box<dyn BackendProvider> {
                match kind {
                    BackendKind::Onnx => Box::new(OnnxProvider::from_config(config)),
                    BackendKind::Neural => Box::new(NeuralProvider::from_config(config)),
                    BackendKind::ExternalBinary => {
                        Box::new(ExternalBinaryProvider::from_config(config))
                    }
                }
            })
            .collect();
        Self::new(providers)
    }

    /// 프로세스 전역 레지스트리
    ///
    /// 최초 호출의 설정으로 한 번만 만들어지며, 이후 호출의 설정은 무시된다.
    pub fn shared(config: &OcrConfig) -> Arc<BackendRegistry> {
        SHARED
            .get_or_init(|| {
                debug!("전역 OCR 백엔드 레지스트리 생성: {:?}", config.backend_order);
                Arc::new(Self::from_config(config))
            })
            .clone()
    }

    /// 종류별 백엔드 인스턴스 (필요 시 생성)
    pub fn backend(&self, kind: BackendKind) -> Option<Arc<dyn OcrBackend>> {
        self.slots
            .iter()
            .find(|s| s.provider.kind() == kind)
            .and_then(BackendSlot::get)
    }

    /// 사용 가능한 백엔드로 구성된 캐스케이드 (최초 호출 시 모든 슬롯을 한 번 탐색)
    pub fn cascade(&self) -> Arc<OcrCascade> {
        self.cascade
            .get_or_init(|| {
                let backends: Vec<Arc<dyn OcrBackend>> =
                    self.slots.iter().filter_map(BackendSlot::get).collect();
                let cascade = OcrCascade::new(backends);
                if cascade.is_empty() {
                    warn!("사용 가능한 OCR 백엔드 없음, 모든 셀이 빈 문자열로 채워짐");
                } else {
                    info!("OCR 캐스케이드 구성: {:?}", cascade.kinds());
                }
                Arc::new(cascade)
            })
            .clone()
    }

    /// 실제로 생성된 백엔드 종류 (진단용)
    pub fn constructed_kinds(&self) -> Vec<BackendKind> {
        self.slots
            .iter()
            .filter(|s| matches!(s.instance.get(), Some(Some(_))))
            .map(|s| s.provider.kind())
            .collect()
    }

    /// 등록된 provider 종류 (우선순위 순)
    pub fn kinds(&self) -> Vec<BackendKind> {
        self.slots.iter().map(|s| s.provider.kind()).collect()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .field("constructed", &self.constructed_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;
    use sheetcap_core::error::OcrError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct FixedBackend(BackendKind, &'static str);

    impl OcrBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn kind(&self) -> BackendKind {
            self.0
        }

        fn recognize(&self, _patch: &DynamicImage) -> Result<String, OcrError> {
            Ok(self.1.to_string())
        }
    }

    struct CountingProvider {
        kind: BackendKind,
        available: bool,
        constructions: Arc<AtomicUsize>,
    }

    impl BackendProvider for CountingProvider {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn try_construct(&self) -> Option<Arc<dyn OcrBackend>> {
            self.constructions.fetch_add(1, Ordering::SeqCst);
            // 느린 모델 로드 흉내
            thread::sleep(std::time::Duration::from_millis(20));
            self.available
                .then(|| Arc::new(FixedBackend(self.kind, "text")) as Arc<dyn OcrBackend>)
        }
    }

    fn counting(kind: BackendKind, available: bool) -> (Box<dyn BackendProvider>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            kind,
            available,
            constructions: counter.clone(),
        };
        (Box::new(provider), counter)
    }

    #[test]
    fn construction_happens_once_under_contention() {
        let (onnx, onnx_count) = counting(BackendKind::Onnx, true);
        let (ext, ext_count) = counting(BackendKind::ExternalBinary, false);
        let registry = Arc::new(BackendRegistry::new(vec![onnx, ext]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || registry.cascade().len())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1);
        }

        assert_eq!(onnx_count.load(Ordering::SeqCst), 1);
        assert_eq!(ext_count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.constructed_kinds(), vec![BackendKind::Onnx]);
    }

    #[test]
    fn cascade_is_memoized() {
        let (onnx, count) = counting(BackendKind::Onnx, true);
        let registry = BackendRegistry::new(vec![onnx]);

        let a = registry.cascade();
        let b = registry.cascade();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.backend(BackendKind::Onnx).is_some());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nothing_constructed_before_first_use() {
        let (onnx, count) = counting(BackendKind::Onnx, true);
        let registry = BackendRegistry::new(vec![onnx]);

        assert!(registry.constructed_kinds().is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn duplicate_kinds_keep_first() {
        let (a, a_count) = counting(BackendKind::Neural, true);
        let (b, b_count) = counting(BackendKind::Neural, true);
        let registry = BackendRegistry::new(vec![a, b]);

        assert_eq!(registry.kinds(), vec![BackendKind::Neural]);
        registry.cascade();
        assert_eq!(a_count.load(Ordering::SeqCst), 1);
        assert_eq!(b_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_unavailable_gives_empty_cascade() {
        let (a, _) = counting(BackendKind::Onnx, false);
        let (b, _) = counting(BackendKind::Neural, false);
        let registry = BackendRegistry::new(vec![a, b]);

        assert!(registry.cascade().is_empty());
        assert!(registry.constructed_kinds().is_empty());
        assert!(registry.backend(BackendKind::ExternalBinary).is_none());
    }

    #[test]
    fn from_config_follows_backend_order() {
        let config = OcrConfig {
            backend_order: vec![BackendKind::ExternalBinary, BackendKind::Onnx],
            ..OcrConfig::default()
        };
        let registry = BackendRegistry::from_config(&config);
        assert_eq!(
            registry.kinds(),
            vec![BackendKind::ExternalBinary, BackendKind::Onnx]
        );
    }
}
