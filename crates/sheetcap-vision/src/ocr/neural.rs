//! 로컬 신경망 OCR 백엔드 (`ocrs` + `rten`).
//!
//! ONNX 백엔드와 별개의 모델 디렉토리를 사용하며, 앞선 백엔드가 결과를 내지 못한
//! 셀에서만 호출된다. `neural` feature 활성화 시에만 실제 백엔드가 빌드된다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sheetcap_core::config::OcrConfig;
use sheetcap_core::config_manager::ConfigManager;
use sheetcap_core::ports::ocr_backend::{BackendKind, BackendProvider, OcrBackend};
use tracing::debug;

/// 검출 모델 파일명
pub const DETECTION_MODEL: &str = "text-detection.rten";
/// 인식 모델 파일명
pub const RECOGNITION_MODEL: &str = "text-recognition.rten";

/// 모델 디렉토리에 검출/인식 모델이 모두 있으면 두 경로를 반환
pub fn locate_models(dir: &Path) -> Option<(PathBuf, PathBuf)> {
    let detection = dir.join(DETECTION_MODEL);
    let recognition = dir.join(RECOGNITION_MODEL);
    (detection.is_file() && recognition.is_file()).then_some((detection, recognition))
}

/// 신경망 백엔드 provider
#[derive(Debug, Clone)]
pub struct NeuralProvider {
    model_dir: Option<PathBuf>,
}

impl NeuralProvider {
    /// 모델 디렉토리로 생성
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self { model_dir }
    }

    /// 설정으로 생성 (디렉토리 미지정 시 `<data_dir>/models/neural`)
    pub fn from_config(config: &OcrConfig) -> Self {
        let model_dir = config
            .neural_model_dir
            .clone()
            .or_else(|| ConfigManager::default_model_dir("neural").ok());
        Self::new(model_dir)
    }
}

impl BackendProvider for NeuralProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Neural
    }

    fn try_construct(&self) -> Option<Arc<dyn OcrBackend>> {
        let dir = self.model_dir.as_deref()?;
        let Some((detection, recognition)) = locate_models(dir) else {
            debug!("신경망 OCR 모델 파일 없음: {}", dir.display());
            return None;
        };
        construct(&detection, &recognition)
    }
}

#[cfg(feature = "neural")]
fn construct(detection: &Path, recognition: &Path) -> Option<Arc<dyn OcrBackend>> {
    match engine::NeuralBackend::load(detection, recognition) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            tracing::warn!("신경망 OCR 백엔드 생성 실패: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "neural"))]
fn construct(detection: &Path, _recognition: &Path) -> Option<Arc<dyn OcrBackend>> {
    debug!(
        "neural feature 비활성화, 모델 무시: {}",
        detection.display()
    );
    None
}

#[cfg(feature = "neural")]
pub use engine::NeuralBackend;

#[cfg(feature = "neural")]
mod engine {
    use std::path::Path;

    use image::DynamicImage;
    use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
    use rten::Model;
    use sheetcap_core::error::OcrError;
    use sheetcap_core::ports::ocr_backend::{BackendKind, OcrBackend};

    /// ocrs 엔진 래퍼 (엔진 메서드가 `&self`라 잠금 없이 공유)
    pub struct NeuralBackend {
        engine: OcrEngine,
    }

    impl NeuralBackend {
        /// 검출/인식 모델 로드
        pub fn load(detection: &Path, recognition: &Path) -> Result<Self, OcrError> {
            let detection_model = Model::load_file(detection)
                .map_err(|e| OcrError::ModelLoad(format!("{}: {e}", detection.display())))?;
            let recognition_model = Model::load_file(recognition)
                .map_err(|e| OcrError::ModelLoad(format!("{}: {e}", recognition.display())))?;

            let engine = OcrEngine::new(OcrEngineParams {
                detection_model: Some(detection_model),
                recognition_model: Some(recognition_model),
                ..Default::default()
            })
            .map_err(|e| OcrError::ModelLoad(e.to_string()))?;

            Ok(Self { engine })
        }
    }

    impl OcrBackend for NeuralBackend {
        fn name(&self) -> &str {
            "ocrs"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Neural
        }

        fn recognize(&self, patch: &DynamicImage) -> Result<String, OcrError> {
            if patch.width() == 0 || patch.height() == 0 {
                return Err(OcrError::EmptyImage);
            }

            let rgb = patch.to_rgb8();
            let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
                .map_err(|e| OcrError::Inference(format!("입력 이미지 변환 실패: {e}")))?;

            let engine = &self.engine;
            let input = engine
                .prepare_input(source)
                .map_err(|e| OcrError::Inference(e.to_string()))?;
            let text = engine
                .get_text(&input)
                .map_err(|e| OcrError::Inference(e.to_string()))?;

            // 여러 줄은 공백 하나로 합친다
            Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
        }
    }
}
