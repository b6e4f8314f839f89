//! # sheetcap
//!
//! 표 이미지 → 스프레드시트 붙여넣기용 텍스트 변환 CLI.
//! 설정 로드, 로깅 초기화, 오케스트레이터 와이어링.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use sheetcap_app::{ExtractionOrchestrator, ExtractionOutcome, ExtractionState, SystemClipboard};
use sheetcap_core::config_manager::ConfigManager;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// 표 이미지에서 셀 텍스트를 추출해 탭 구분 텍스트로 출력
#[derive(Parser, Debug)]
#[command(name = "sheetcap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 입력 이미지 경로 (PNG, JPEG, BMP 등)
    image: PathBuf,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리/config.json)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// 시스템 클립보드에 기록하지 않음
    #[arg(long)]
    no_clipboard: bool,

    /// 구분 텍스트 대신 JSON 출력
    #[arg(long)]
    json: bool,

    /// 결과를 파일에 기록 (기본: 표준 출력)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 로그는 stderr: stdout은 추출 결과 전용
    let log_filter = format!(
        "sheetcap={level},sheetcap_app={level},sheetcap_core={level},sheetcap_vision={level}",
        level = args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match &args.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    }
    .context("설정 로드 실패")?;
    let config = config_manager.effective();
    debug!("설정 파일: {}", config_manager.config_path().display());

    let mut builder = ExtractionOrchestrator::builder(config);
    if !args.no_clipboard {
        builder = builder.clipboard(Arc::new(SystemClipboard::new()));
    }
    let orchestrator = builder.build().context("추출 워커 시작 실패")?;

    orchestrator
        .submit(args.image.clone())
        .map_err(|e| anyhow!("추출 요청 실패: {e}"))?;

    let state = orchestrator.wait_settled().await;
    orchestrator.shutdown();

    match state {
        ExtractionState::Completed(outcome) => {
            let rendered = if args.json {
                render_json(&outcome)?
            } else {
                outcome.delimited.clone()
            };
            write_output(args.output.as_ref(), &rendered)?;
            info!(
                "완료: {}행 x {}열 ({:?})",
                outcome.table.row_count(),
                outcome.table.column_count(),
                outcome.elapsed
            );
            Ok(())
        }
        ExtractionState::Failed { source, error } => {
            Err(anyhow!(error).context(format!("표 추출 실패: {source}")))
        }
        other => Err(anyhow!("예상치 못한 상태: {other:?}")),
    }
}

fn render_json(outcome: &ExtractionOutcome) -> Result<String> {
    let value = serde_json::json!({
        "source": outcome.source.to_string(),
        "rows": outcome.table.row_count(),
        "columns": outcome.table.column_count(),
        "cells": outcome.table.rows(),
        "elapsed_ms": outcome.elapsed.as_millis() as u64,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn write_output(path: Option<&PathBuf>, text: &str) -> Result<()> {
    match path {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("출력 파일 저장 실패: {}", path.display()))?;
            info!("결과 저장: {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}
