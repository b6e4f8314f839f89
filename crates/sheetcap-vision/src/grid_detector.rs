//! 표 격자선 검출.
//!
//! 처리 순서:
//! 1. 밝기 변환 → 반전 → 적응형 평균 이진화
//! 2. 가로/세로 선 커널 열림으로 가로선, 세로선 마스크 분리
//! 3. 행/열 투영 프로파일 → 최대값 비율 임계값 + 최소 연속 길이
//! 4. 인접 인덱스 클러스터링 → 선 좌표
//!
//! 기울어진 이미지는 보정하지 않는다. 점선/끊긴 선은 투영값이 약해 누락될 수 있다.

use image::{DynamicImage, GrayImage};
use sheetcap_core::config::GridDetectionConfig;
use sheetcap_core::error::ExtractionError;
use sheetcap_core::models::grid::GridLines;
use tracing::debug;

use crate::binarize::{adaptive_threshold_inverted, FOREGROUND};
use crate::morphology::{open_horizontal, open_vertical};

/// 방향별 선 마스크 (전경 255)
#[derive(Debug, Clone)]
pub struct LineMasks {
    /// 가로선만 남은 마스크
    pub horizontal: GrayImage,
    /// 세로선만 남은 마스크
    pub vertical: GrayImage,
}

/// 한 축의 투영 프로파일
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineProfile {
    /// 위치별 전경 픽셀 수
    pub counts: Vec<u32>,
    /// 위치별 가장 긴 연속 전경 길이
    pub longest_runs: Vec<u32>,
}

impl LineProfile {
    fn with_len(len: usize) -> Self {
        Self {
            counts: vec![0; len],
            longest_runs: vec![0; len],
        }
    }
}

/// 이미지에서 격자선 좌표 검출
///
/// 어느 축이든 선이 2개 미만이면 `ExtractionError::NoGridDetected`.
pub fn detect_grid(
    image: &DynamicImage,
    config: &GridDetectionConfig,
) -> Result<GridLines, ExtractionError> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractionError::NoGridDetected {
            columns: 0,
            rows: 0,
        });
    }

    let masks = line_masks(&gray, config);
    let (h_kernel, v_kernel) = kernel_lengths(width, height, config);

    // 가로선은 너비 대비, 세로선은 높이 대비 최소 길이
    let min_row_run = min_line_length(width, h_kernel, config);
    let min_col_run = min_line_length(height, v_kernel, config);

    let xs = strong_positions(&column_profile(&masks.vertical), min_col_run, config);
    let ys = strong_positions(&row_profile(&masks.horizontal), min_row_run, config);

    let columns = cluster_positions(&xs, config.cluster_gap);
    let rows = cluster_positions(&ys, config.cluster_gap);

    debug!(
        "격자 검출: {}x{} → 세로선 {}개 {:?}, 가로선 {}개 {:?}",
        width,
        height,
        columns.len(),
        columns,
        rows.len(),
        rows
    );

    GridLines::new(columns, rows, width, height)
}

/// 이진화 + 방향별 열림
pub fn line_masks(gray: &GrayImage, config: &GridDetectionConfig) -> LineMasks {
    let (width, height) = gray.dimensions();
    let binary = adaptive_threshold_inverted(gray, config.block_size, config.threshold_offset);
    let (h_kernel, v_kernel) = kernel_lengths(width, height, config);

    LineMasks {
        horizontal: open_horizontal(&binary, h_kernel),
        vertical: open_vertical(&binary, v_kernel),
    }
}

/// (가로 커널, 세로 커널) 길이 = 너비/divisor, 높이/divisor
fn kernel_lengths(width: u32, height: u32, config: &GridDetectionConfig) -> (u32, u32) {
    let divisor = config.kernel_divisor.max(1);
    ((width / divisor).max(1), (height / divisor).max(1))
}

fn min_line_length(extent: u32, kernel_len: u32, config: &GridDetectionConfig) -> u32 {
    let fraction = config.min_line_fraction.clamp(0.0, 1.0);
    let by_extent = (fraction * extent as f32).ceil() as u32;
    by_extent.max(kernel_len)
}

/// 행별 프로파일 (가로선 마스크용)
pub fn row_profile(mask: &GrayImage) -> LineProfile {
    let (width, height) = mask.dimensions();
    scan_profile(height, width, |y, x| mask.get_pixel(x, y)[0] == FOREGROUND)
}

/// 열별 프로파일 (세로선 마스크용)
pub fn column_profile(mask: &GrayImage) -> LineProfile {
    let (width, height) = mask.dimensions();
    scan_profile(width, height, |x, y| mask.get_pixel(x, y)[0] == FOREGROUND)
}

fn scan_profile(positions: u32, extent: u32, is_fg: impl Fn(u32, u32) -> bool) -> LineProfile {
    let mut profile = LineProfile::with_len(positions as usize);
    for (i, pos) in (0..positions).enumerate() {
        let mut run = 0u32;
        for along in 0..extent {
            if is_fg(pos, along) {
                run += 1;
                profile.counts[i] += 1;
                profile.longest_runs[i] = profile.longest_runs[i].max(run);
            } else {
                run = 0;
            }
        }
    }
    profile
}

/// 유지 조건: 값 ≥ `max(min_support, ratio * 최대값)` 이고 최장 연속 길이 ≥ `min_run`
fn strong_positions(
    profile: &LineProfile,
    min_run: u32,
    config: &GridDetectionConfig,
) -> Vec<u32> {
    let max = profile.counts.iter().copied().max().unwrap_or(0);
    let relative = config.profile_ratio * max as f32;
    let min_support = config.min_profile_support.max(1);

    profile
        .counts
        .iter()
        .zip(&profile.longest_runs)
        .enumerate()
        .filter(|&(_, (&v, &run))| v >= min_support && v as f32 >= relative && run >= min_run)
        .map(|(i, _)| i as u32)
        .collect()
}

/// 인접 인덱스 클러스터링
///
/// 정렬 후 직전 인덱스와의 간격이 `gap`을 넘으면 새 클러스터를 시작한다.
/// 클러스터 좌표는 구성원 평균을 짝수 쪽 반올림한 값.
pub fn cluster_positions(positions: &[u32], gap: u32) -> Vec<u32> {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();

    let mut groups: Vec<Vec<u32>> = Vec::new();
    let mut prev: Option<u32> = None;
    for v in sorted {
        if prev.map_or(true, |p| v - p > gap) {
            groups.push(Vec::new());
        }
        if let Some(group) = groups.last_mut() {
            group.push(v);
        }
        prev = Some(v);
    }

    let mut centers: Vec<u32> = groups
        .iter()
        .map(|g| {
            let mean = g.iter().map(|&v| f64::from(v)).sum::<f64>() / g.len() as f64;
            mean.round_ties_even() as u32
        })
        .collect();
    centers.dedup();
    centers
}
