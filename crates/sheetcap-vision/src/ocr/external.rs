//! 외부 Tesseract 실행 파일 백엔드.
//!
//! 셀 이미지를 임시 PNG로 저장한 뒤 `tesseract <png> stdout -l <langs> --psm <n>`을 실행한다.
//! 언어 지정 실행이 실패하면(언어 데이터 누락 등) `-l` 없이 한 번 더 시도한다.
//!
//! 실행 파일 탐색 순서:
//! 1. 설정 `tesseract_path` → 환경 변수 `SHEETCAP_TESSERACT` → `TESSERACT_CMD`
//! 2. 번들 경로 (`<exe 디렉토리>/tesseract/`, `<exe 디렉토리>/Tesseract-OCR/`, `./tools/tesseract/`)
//! 3. OS별 기본 설치 경로
//! 4. `PATH`

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};
use sheetcap_core::config::{OcrConfig, ENV_TESSERACT};
use sheetcap_core::error::OcrError;
use sheetcap_core::ports::ocr_backend::{BackendKind, BackendProvider, OcrBackend};
use tracing::{debug, warn};

/// 널리 쓰이는 tesseract 경로 환경 변수
const ENV_TESSERACT_CMD: &str = "TESSERACT_CMD";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

// ============================================================
// 실행 파일 탐색
// ============================================================

/// tesseract 실행 파일 후보 경로
#[derive(Debug, Clone, Default)]
pub struct ExecutableSearch {
    /// 설정 또는 환경 변수로 지정된 경로
    pub explicit: Option<PathBuf>,
    /// 현재 실행 파일이 있는 디렉토리
    pub exe_dir: Option<PathBuf>,
    /// 작업 디렉토리
    pub work_dir: Option<PathBuf>,
    /// OS별 기본 설치 경로
    pub well_known: Vec<PathBuf>,
    /// `PATH` 디렉토리
    pub path_dirs: Vec<PathBuf>,
}

impl ExecutableSearch {
    /// 현재 프로세스 환경에서 탐색 경로 구성
    pub fn from_environment(config: &OcrConfig) -> Self {
        let explicit = config
            .tesseract_path
            .clone()
            .or_else(|| env_path(ENV_TESSERACT))
            .or_else(|| env_path(ENV_TESSERACT_CMD));

        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf));

        let path_dirs = std::env::var_os("PATH")
            .map(|p| std::env::split_paths(&p).collect())
            .unwrap_or_default();

        Self {
            explicit,
            exe_dir,
            work_dir: std::env::current_dir().ok(),
            well_known: well_known_paths(),
            path_dirs,
        }
    }

    /// 우선순위 순서의 후보 목록
    pub fn candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        candidates.extend(self.explicit.clone());
        if let Some(dir) = &self.exe_dir {
            candidates.push(dir.join("tesseract").join(EXECUTABLE_NAME));
            candidates.push(dir.join("Tesseract-OCR").join(EXECUTABLE_NAME));
        }
        if let Some(dir) = &self.work_dir {
            candidates.push(dir.join("tools").join("tesseract").join(EXECUTABLE_NAME));
        }
        candidates.extend(self.well_known.iter().cloned());
        candidates.extend(self.path_dirs.iter().map(|d| d.join(EXECUTABLE_NAME)));
        candidates
    }

    /// 존재하는 첫 번째 후보
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(explicit) = &self.explicit {
            if !explicit.is_file() {
                warn!("지정된 tesseract 경로가 없음, 자동 탐색으로 진행: {}", explicit.display());
            }
        }
        self.candidates().into_iter().find(|p| p.is_file())
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(windows)]
fn well_known_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe"),
        PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe"),
    ];
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        paths.push(
            PathBuf::from(local)
                .join("Programs")
                .join("Tesseract-OCR")
                .join(EXECUTABLE_NAME),
        );
    }
    paths
}

#[cfg(target_os = "macos")]
fn well_known_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/opt/homebrew/bin/tesseract"),
        PathBuf::from("/usr/local/bin/tesseract"),
        PathBuf::from("/opt/local/bin/tesseract"),
    ]
}

#[cfg(not(any(windows, target_os = "macos")))]
fn well_known_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/bin/tesseract"),
        PathBuf::from("/usr/local/bin/tesseract"),
        PathBuf::from("/snap/bin/tesseract"),
    ]
}

// ============================================================
// ExternalBinaryBackend
// ============================================================

/// tesseract 프로세스 호출 백엔드
#[derive(Debug, Clone)]
pub struct ExternalBinaryBackend {
    executable: PathBuf,
    languages: String,
    psm: u8,
}

impl ExternalBinaryBackend {
    /// 실행 파일 경로, 언어(`-l`), 페이지 분할 모드(`--psm`)로 생성
    pub fn new(executable: PathBuf, languages: impl Into<String>, psm: u8) -> Self {
        Self {
            executable,
            languages: languages.into(),
            psm,
        }
    }

    /// 실행 파일 경로
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn run(&self, input: &Path, languages: Option<&str>) -> Result<Output, OcrError> {
        let mut cmd = Command::new(&self.executable);
        cmd.arg(input).arg("stdout");
        if let Some(langs) = languages {
            cmd.arg("-l").arg(langs);
        }
        cmd.arg("--psm")
            .arg(self.psm.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            // CREATE_NO_WINDOW: 셀마다 콘솔 창이 뜨지 않도록
            cmd.creation_flags(0x0800_0000);
        }

        Ok(cmd.output()?)
    }
}

impl OcrBackend for ExternalBinaryBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn kind(&self) -> BackendKind {
        BackendKind::ExternalBinary
    }

    fn is_available(&self) -> bool {
        self.executable.is_file()
    }

    fn recognize(&self, patch: &DynamicImage) -> Result<String, OcrError> {
        if patch.width() == 0 || patch.height() == 0 {
            return Err(OcrError::EmptyImage);
        }

        let dir = tempfile::Builder::new().prefix("sheetcap-ocr-").tempdir()?;
        let input = dir.path().join("cell.png");
        patch
            .save_with_format(&input, ImageFormat::Png)
            .map_err(|e| OcrError::Process(format!("셀 이미지 저장 실패: {e}")))?;

        let languages = Some(self.languages.as_str()).filter(|l| !l.is_empty());
        let mut output = self.run(&input, languages)?;
        if !output.status.success() && languages.is_some() {
            debug!(
                "tesseract 언어 지정 실행 실패, 기본 언어로 재시도: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            output = self.run(&input, None)?;
        }

        if !output.status.success() {
            return Err(OcrError::Process(format!(
                "tesseract 종료 코드 {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ============================================================
// Provider
// ============================================================

/// 실행 파일을 찾으면 `ExternalBinaryBackend` 생성
#[derive(Debug, Clone)]
pub struct ExternalBinaryProvider {
    search: ExecutableSearch,
    languages: String,
    psm: u8,
}

impl ExternalBinaryProvider {
    /// 설정 + 현재 환경으로 생성
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::with_search(
            ExecutableSearch::from_environment(config),
            config.tesseract_languages.clone(),
            config.tesseract_psm,
        )
    }

    /// 탐색 경로를 직접 지정해 생성
    pub fn with_search(search: ExecutableSearch, languages: String, psm: u8) -> Self {
        Self {
            search,
            languages,
            psm,
        }
    }
}

impl BackendProvider for ExternalBinaryProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::ExternalBinary
    }

    fn try_construct(&self) -> Option<Arc<dyn OcrBackend>> {
        match self.search.resolve() {
            Some(path) => {
                debug!("tesseract 실행 파일: {}", path.display());
                Some(Arc::new(ExternalBinaryBackend::new(
                    path,
                    self.languages.clone(),
                    self.psm,
                )))
            }
            None => {
                debug!("tesseract 실행 파일을 찾을 수 없음");
                None
            }
        }
    }
}
