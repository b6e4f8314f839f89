//! 애플리케이션 설정 구조체.
//!
//! 격자 검출 파라미터, 셀 패딩, OCR 백엔드 순서와 모델 경로 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ports::ocr_backend::BackendKind;

/// Tesseract 실행 파일 경로 환경 변수
pub const ENV_TESSERACT: &str = "SHEETCAP_TESSERACT";

/// ONNX 모델 디렉토리 환경 변수
pub const ENV_ONNX_MODELS: &str = "SHEETCAP_ONNX_MODELS";

/// 신경망 모델 디렉토리 환경 변수
pub const ENV_NEURAL_MODELS: &str = "SHEETCAP_NEURAL_MODELS";

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 격자 검출 설정
    #[serde(default)]
    pub grid: GridDetectionConfig,
    /// 셀 분할 설정
    #[serde(default)]
    pub segment: SegmentConfig,
    /// OCR 설정
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl AppConfig {
    /// 기본 설정
    pub fn default_config() -> Self {
        Self::default()
    }

    /// 환경 변수로 경로 설정 덮어쓰기 (설정 파일보다 우선)
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = env_path(ENV_ONNX_MODELS) {
            self.ocr.onnx_model_dir = Some(path);
        }
        if let Some(path) = env_path(ENV_NEURAL_MODELS) {
            self.ocr.neural_model_dir = Some(path);
        }
        if let Some(path) = env_path(ENV_TESSERACT) {
            self.ocr.tesseract_path = Some(path);
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

// ============================================================
// 격자 검출 설정
// ============================================================

/// 격자 검출 설정 — 적응형 이진화, 모폴로지, 투영 프로파일, 클러스터링
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDetectionConfig {
    /// 적응형 임계값 윈도우 크기 (홀수, 픽셀)
    #[serde(default = "default_block_size")]
    pub block_size: u32,
    /// 임계값 오프셋 C: `inv > mean - C` 이면 전경
    #[serde(default = "default_threshold_offset")]
    pub threshold_offset: i32,
    /// 선 커널 길이 = 이미지 너비(높이) / divisor
    #[serde(default = "default_kernel_divisor")]
    pub kernel_divisor: u32,
    /// 투영 프로파일 최대값 대비 유지 비율 (0.0 ~ 1.0)
    #[serde(default = "default_profile_ratio")]
    pub profile_ratio: f32,
    /// 투영 프로파일 최소 지지 픽셀 수
    #[serde(default = "default_min_profile_support")]
    pub min_profile_support: u32,
    /// 선으로 인정할 최소 연속 길이 (직교 축 길이 대비 비율)
    ///
    /// 열림을 통과한 짧은 잡음 구간이 격자선으로 잡히지 않도록 한다.
    #[serde(default = "default_min_line_fraction")]
    pub min_line_fraction: f32,
    /// 같은 선으로 묶는 최대 인덱스 간격 (픽셀)
    #[serde(default = "default_cluster_gap")]
    pub cluster_gap: u32,
}

impl Default for GridDetectionConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            threshold_offset: default_threshold_offset(),
            kernel_divisor: default_kernel_divisor(),
            profile_ratio: default_profile_ratio(),
            min_profile_support: default_min_profile_support(),
            min_line_fraction: default_min_line_fraction(),
            cluster_gap: default_cluster_gap(),
        }
    }
}

fn default_block_size() -> u32 {
    15
}

fn default_threshold_offset() -> i32 {
    -2
}

fn default_kernel_divisor() -> u32 {
    40
}

fn default_profile_ratio() -> f32 {
    0.5
}

fn default_min_profile_support() -> u32 {
    1
}

fn default_min_line_fraction() -> f32 {
    0.1
}

fn default_cluster_gap() -> u32 {
    4
}

// ============================================================
// 셀 분할 설정
// ============================================================

/// 셀 분할 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// 격자선을 제외하기 위한 셀 안쪽 여백 (픽셀)
    #[serde(default = "default_cell_padding")]
    pub cell_padding: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            cell_padding: default_cell_padding(),
        }
    }
}

fn default_cell_padding() -> u32 {
    2
}

// ============================================================
// OCR 설정
// ============================================================

/// OCR 설정 — 백엔드 우선순위와 모델/실행 파일 위치
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// 캐스케이드 순서 (앞쪽이 우선)
    #[serde(default = "BackendKind::default_order")]
    pub backend_order: Vec<BackendKind>,
    /// ONNX 모델 디렉토리 (None이면 데이터 디렉토리/models/onnx)
    #[serde(default)]
    pub onnx_model_dir: Option<PathBuf>,
    /// 신경망 모델 디렉토리 (None이면 데이터 디렉토리/models/neural)
    #[serde(default)]
    pub neural_model_dir: Option<PathBuf>,
    /// tesseract 실행 파일 경로 (None이면 자동 탐색)
    #[serde(default)]
    pub tesseract_path: Option<PathBuf>,
    /// tesseract 언어 (`-l` 인자)
    #[serde(default = "default_tesseract_languages")]
    pub tesseract_languages: String,
    /// tesseract 페이지 분할 모드 (`--psm` 인자)
    #[serde(default = "default_tesseract_psm")]
    pub tesseract_psm: u8,
    /// ONNX Runtime 스레드 수
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            backend_order: BackendKind::default_order(),
            onnx_model_dir: None,
            neural_model_dir: None,
            tesseract_path: None,
            tesseract_languages: default_tesseract_languages(),
            tesseract_psm: default_tesseract_psm(),
            intra_threads: default_intra_threads(),
        }
    }
}

fn default_tesseract_languages() -> String {
    "chi_sim+eng".to_string()
}

/// 6: 단일 텍스트 블록 (셀 하나 단위에 적합)
fn default_tesseract_psm() -> u8 {
    6
}

fn default_intra_threads() -> usize {
    4
}
