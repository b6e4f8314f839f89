//! 표 추출 오케스트레이터.
//!
//! 전용 워커 스레드 하나에서 디코딩 → 격자 검출 → 셀 분할 → 표 조립 → 직렬화를 실행하고,
//! 상태 변화를 `tokio::sync::watch` 채널로 알린다. 호출자는 블로킹되지 않는다.
//!
//! 상태 전이:
//! - `Idle | Completed | Failed` → `Running` (submit 수락)
//! - `Running` → `Completed | Failed` (워커가 작업 종료 시)
//! - `Running` 중 submit → `SubmitError::AlreadyRunning` (대기열 없음)

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender};
use image::DynamicImage;
use sheetcap_core::config::AppConfig;
use sheetcap_core::error::{CoreError, ExtractionError};
use sheetcap_core::models::table::Table;
use sheetcap_core::ports::clipboard::ClipboardSink;
use sheetcap_vision::ocr::BackendRegistry;
use sheetcap_vision::pipeline::TableExtractor;
use sheetcap_vision::serializer::to_delimited_text;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// 워커 스레드 이름
const WORKER_THREAD_NAME: &str = "sheetcap-extract";

// ============================================================
// 상태 타입
// ============================================================

/// 추출 입력 출처
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionSource {
    /// 이미지 파일 경로
    File(PathBuf),
    /// 이미 디코딩된 메모리 이미지 (라벨)
    Memory(String),
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::File(path) => write!(f, "{}", path.display()),
            ExtractionSource::Memory(label) => write!(f, "<{label}>"),
        }
    }
}

/// 성공한 추출 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    /// 입력 출처
    pub source: ExtractionSource,
    /// 추출된 표
    pub table: Table,
    /// 탭/줄바꿈 구분 텍스트
    pub delimited: String,
    /// 소요 시간
    pub elapsed: Duration,
}

/// 오케스트레이터 상태
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExtractionState {
    /// 아직 요청 없음
    #[default]
    Idle,
    /// 워커에서 추출 중
    Running {
        /// 입력 출처
        source: ExtractionSource,
    },
    /// 추출 성공
    Completed(ExtractionOutcome),
    /// 추출 실패
    Failed {
        /// 입력 출처
        source: ExtractionSource,
        /// 실패 원인
        error: ExtractionError,
    },
}

impl ExtractionState {
    /// 추출 진행 중인지
    pub fn is_running(&self) -> bool {
        matches!(self, ExtractionState::Running { .. })
    }

    /// 종료 상태(Completed/Failed)인지
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionState::Completed(_) | ExtractionState::Failed { .. }
        )
    }
}

/// 요청 거부 사유
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// 이전 추출이 아직 진행 중
    #[error("이미 표 추출이 진행 중")]
    AlreadyRunning,

    /// 워커 스레드가 종료됨
    #[error("추출 워커가 종료됨")]
    WorkerGone,
}

// ============================================================
// 오케스트레이터
// ============================================================

enum Job {
    File(PathBuf),
    Image { label: String, image: DynamicImage },
}

/// 오케스트레이터 빌더
pub struct OrchestratorBuilder {
    config: AppConfig,
    registry: Option<Arc<BackendRegistry>>,
    clipboard: Option<Arc<dyn ClipboardSink>>,
}

impl OrchestratorBuilder {
    /// OCR 백엔드 레지스트리 지정 (기본: `BackendRegistry::shared`)
    pub fn registry(mut self, registry: Arc<BackendRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// 추출 성공 시 구분 텍스트를 기록할 클립보드
    pub fn clipboard(mut self, clipboard: Arc<dyn ClipboardSink>) -> Self {
        self.clipboard = Some(clipboard);
        self
    }

    /// 워커 스레드 시작
    pub fn build(self) -> Result<ExtractionOrchestrator, CoreError> {
        let registry = self
            .registry
            .unwrap_or_else(|| BackendRegistry::shared(&self.config.ocr));
        let extractor = TableExtractor::new(&self.config, registry);

        let (jobs_tx, jobs_rx) = channel::unbounded();
        let state = Arc::new(watch::Sender::new(ExtractionState::Idle));

        let worker = Worker {
            jobs: jobs_rx,
            state: state.clone(),
            extractor,
            clipboard: self.clipboard,
        };
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())?;

        debug!("추출 워커 스레드 시작");
        Ok(ExtractionOrchestrator {
            jobs: Some(jobs_tx),
            state,
            worker: Some(handle),
        })
    }
}

/// 표 추출 오케스트레이터
///
/// 인스턴스마다 전용 워커 스레드 하나를 가진다. 드롭하면 작업 채널이 닫히고,
/// 워커는 진행 중인 작업을 마친 뒤 종료한다.
pub struct ExtractionOrchestrator {
    jobs: Option<Sender<Job>>,
    state: Arc<watch::Sender<ExtractionState>>,
    worker: Option<JoinHandle<()>>,
}

impl ExtractionOrchestrator {
    /// 빌더 생성
    pub fn builder(config: AppConfig) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            registry: None,
            clipboard: None,
        }
    }

    /// 기본 구성(전역 레지스트리, 클립보드 없음)으로 시작
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        Self::builder(config).build()
    }

    /// 이미지 파일 추출 요청
    pub fn submit(&self, path: impl Into<PathBuf>) -> Result<(), SubmitError> {
        let path = path.into();
        self.dispatch(ExtractionSource::File(path.clone()), Job::File(path))
    }

    /// 디코딩된 이미지 추출 요청 (`label`은 로그/상태 표시용)
    pub fn submit_image(
        &self,
        label: impl Into<String>,
        image: DynamicImage,
    ) -> Result<(), SubmitError> {
        let label = label.into();
        self.dispatch(
            ExtractionSource::Memory(label.clone()),
            Job::Image { label, image },
        )
    }

    /// 현재 상태 스냅샷
    pub fn state(&self) -> ExtractionState {
        self.state.borrow().clone()
    }

    /// 상태 변경 수신기
    pub fn subscribe(&self) -> watch::Receiver<ExtractionState> {
        self.state.subscribe()
    }

    /// Running이 아닐 때까지 대기 후 상태 반환
    pub async fn wait_settled(&self) -> ExtractionState {
        let mut rx = self.state.subscribe();
        let settled = match rx.wait_for(|s| !s.is_running()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    /// 작업 채널을 닫고 워커 종료까지 대기
    pub fn shutdown(mut self) {
        self.jobs.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("추출 워커 스레드 비정상 종료");
            }
        }
    }

    fn dispatch(&self, source: ExtractionSource, job: Job) -> Result<(), SubmitError> {
        let jobs = self.jobs.as_ref().ok_or(SubmitError::WorkerGone)?;

        // 확인과 전이를 한 번에: 동시에 두 요청이 들어와도 하나만 수락된다
        let mut accepted = false;
        self.state.send_if_modified(|state| {
            if state.is_running() {
                return false;
            }
            *state = ExtractionState::Running {
                source: source.clone(),
            };
            accepted = true;
            true
        });
        if !accepted {
            debug!("추출 요청 거부 (진행 중): {}", source);
            return Err(SubmitError::AlreadyRunning);
        }

        if jobs.send(job).is_err() {
            self.state.send_replace(ExtractionState::Failed {
                source,
                error: ExtractionError::Extraction("추출 워커가 종료됨".to_string()),
            });
            return Err(SubmitError::WorkerGone);
        }

        info!("표 추출 시작: {}", source);
        Ok(())
    }
}

impl Drop for ExtractionOrchestrator {
    fn drop(&mut self) {
        // 채널만 닫는다. 진행 중 작업은 워커가 마무리한다.
        self.jobs.take();
    }
}

// ============================================================
// 워커
// ============================================================

struct Worker {
    jobs: Receiver<Job>,
    state: Arc<watch::Sender<ExtractionState>>,
    extractor: TableExtractor,
    clipboard: Option<Arc<dyn ClipboardSink>>,
}

impl Worker {
    fn run(self) {
        for job in self.jobs.iter() {
            let next = self.process(job);
            self.state.send_replace(next);
        }
        debug!("추출 워커 종료");
    }

    fn process(&self, job: Job) -> ExtractionState {
        let start = Instant::now();
        let (source, result) = match job {
            Job::File(path) => {
                let result = self.guarded(|| self.extractor.extract_file(&path));
                (ExtractionSource::File(path), result)
            }
            Job::Image { label, image } => {
                let result = self.guarded(|| self.extractor.extract(&image));
                (ExtractionSource::Memory(label), result)
            }
        };

        match result {
            Ok(table) => {
                let delimited = to_delimited_text(&table);
                if let Some(clipboard) = &self.clipboard {
                    match clipboard.write_text(&delimited) {
                        Ok(()) => debug!("클립보드 기록 완료 ({}바이트)", delimited.len()),
                        Err(e) => warn!("클립보드 기록 실패: {}", e),
                    }
                }

                let elapsed = start.elapsed();
                info!(
                    "표 추출 완료: {} ({}행 x {}열, {:?})",
                    source,
                    table.row_count(),
                    table.column_count(),
                    elapsed
                );
                ExtractionState::Completed(ExtractionOutcome {
                    source,
                    table,
                    delimited,
                    elapsed,
                })
            }
            Err(error) => {
                warn!("표 추출 실패: {}: {}", source, error);
                ExtractionState::Failed { source, error }
            }
        }
    }

    /// 파이프라인 패닉을 Failed 상태로 변환 (Running에 머무르지 않도록)
    fn guarded<F>(&self, f: F) -> Result<Table, ExtractionError>
    where
        F: FnOnce() -> Result<Table, ExtractionError>,
    {
        panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
            error!("표 추출 중 패닉 발생");
            Err(ExtractionError::Extraction(
                "표 추출 중 내부 오류 발생".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_predicates() {
        let running = ExtractionState::Running {
            source: ExtractionSource::Memory("x".to_string()),
        };
        assert!(running.is_running());
        assert!(!running.is_terminal());
        assert!(!ExtractionState::Idle.is_running());
        assert!(!ExtractionState::Idle.is_terminal());

        let failed = ExtractionState::Failed {
            source: ExtractionSource::File(PathBuf::from("a.png")),
            error: ExtractionError::NoGridDetected {
                columns: 0,
                rows: 0,
            },
        };
        assert!(failed.is_terminal());
    }

    #[test]
    fn source_display() {
        assert_eq!(
            ExtractionSource::Memory("clipboard".to_string()).to_string(),
            "<clipboard>"
        );
        assert_eq!(
            ExtractionSource::File(PathBuf::from("t.png")).to_string(),
            "t.png"
        );
    }

    fn empty_registry_orchestrator() -> ExtractionOrchestrator {
        ExtractionOrchestrator::builder(AppConfig::default())
            .registry(Arc::new(BackendRegistry::new(Vec::new())))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn wait_settled_returns_idle_without_submit() {
        let orchestrator = empty_registry_orchestrator();
        assert_eq!(orchestrator.wait_settled().await, ExtractionState::Idle);
        orchestrator.shutdown();
    }

    #[tokio::test]
    async fn wait_settled_returns_failure_state() {
        let orchestrator = empty_registry_orchestrator();
        let blank = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            120,
            80,
            image::Luma([255]),
        ));
        orchestrator.submit_image("blank", blank).unwrap();

        let settled = orchestrator.wait_settled().await;
        assert!(
            matches!(
                settled,
                ExtractionState::Failed {
                    error: ExtractionError::NoGridDetected { .. },
                    ..
                }
            ),
            "{settled:?}"
        );
        orchestrator.shutdown();
    }

    #[test]
    fn submit_error_messages() {
        assert_eq!(SubmitError::AlreadyRunning.to_string(), "이미 표 추출이 진행 중");
    }
}
