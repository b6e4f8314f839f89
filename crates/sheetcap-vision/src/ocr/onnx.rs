//! 로컬 ONNX 모델 백엔드 (PP-OCR 계열 검출 + 인식 모델 쌍).
//!
//! `onnx` feature 활성화 시에만 실제 백엔드가 빌드된다.
//! 꺼져 있거나 모델 파일이 없으면 provider가 `None`을 반환해 캐스케이드에서 빠진다.
//!
//! 모델 디렉토리 구성:
//! - `det.onnx` — DB 텍스트 검출 모델
//! - `rec.onnx` — CRNN/CTC 텍스트 인식 모델
//! - `keys.txt` — 인식 문자 사전 (한 줄에 한 글자)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sheetcap_core::config::OcrConfig;
use sheetcap_core::config_manager::ConfigManager;
use sheetcap_core::ports::ocr_backend::{BackendKind, BackendProvider, OcrBackend};
use tracing::debug;

/// 검출 모델 파일명
pub const DETECTION_MODEL: &str = "det.onnx";
/// 인식 모델 파일명
pub const RECOGNITION_MODEL: &str = "rec.onnx";
/// 문자 사전 파일명
pub const CHARACTER_DICT: &str = "keys.txt";

/// 모델 디렉토리 안의 파일 경로
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnnxModelFiles {
    pub detection: PathBuf,
    pub recognition: PathBuf,
    pub dictionary: PathBuf,
}

impl OnnxModelFiles {
    /// 세 파일이 모두 있을 때만 Some
    pub fn locate(dir: &Path) -> Option<Self> {
        let files = Self {
            detection: dir.join(DETECTION_MODEL),
            recognition: dir.join(RECOGNITION_MODEL),
            dictionary: dir.join(CHARACTER_DICT),
        };
        let complete =
            files.detection.is_file() && files.recognition.is_file() && files.dictionary.is_file();
        complete.then_some(files)
    }
}

/// ONNX 백엔드 provider
#[derive(Debug, Clone)]
pub struct OnnxProvider {
    model_dir: Option<PathBuf>,
    intra_threads: usize,
}

impl OnnxProvider {
    /// 모델 디렉토리와 추론 스레드 수로 생성
    pub fn new(model_dir: Option<PathBuf>, intra_threads: usize) -> Self {
        Self {
            model_dir,
            intra_threads,
        }
    }

    /// 설정으로 생성 (디렉토리 미지정 시 `<data_dir>/models/onnx`)
    pub fn from_config(config: &OcrConfig) -> Self {
        let model_dir = config
            .onnx_model_dir
            .clone()
            .or_else(|| ConfigManager::default_model_dir("onnx").ok());
        Self::new(model_dir, config.intra_threads)
    }
}

impl BackendProvider for OnnxProvider {
    fn kind(&self) -> BackendKind {
        BackendKind::Onnx
    }

    fn try_construct(&self) -> Option<Arc<dyn OcrBackend>> {
        let dir = self.model_dir.as_deref()?;
        let Some(files) = OnnxModelFiles::locate(dir) else {
            debug!("ONNX 모델 파일 없음: {}", dir.display());
            return None;
        };
        construct(&files, self.intra_threads)
    }
}

#[cfg(feature = "onnx")]
fn construct(files: &OnnxModelFiles, intra_threads: usize) -> Option<Arc<dyn OcrBackend>> {
    match engine::OnnxBackend::load(files, intra_threads) {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            tracing::warn!("ONNX 백엔드 생성 실패: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn construct(files: &OnnxModelFiles, _intra_threads: usize) -> Option<Arc<dyn OcrBackend>> {
    debug!(
        "onnx feature 비활성화, 모델 무시: {}",
        files.detection.display()
    );
    None
}

#[cfg(feature = "onnx")]
pub use engine::OnnxBackend;

#[cfg(feature = "onnx")]
mod engine {
    use std::io::{BufRead, BufReader};

    use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Luma};
    use imageproc::contours::find_contours;
    use imageproc::distance_transform::Norm;
    use imageproc::morphology::dilate;
    use ndarray::{Array3, Array4, ArrayView2, Axis, Ix3, Ix4};
    use ort::inputs;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::session::Session;
    use ort::value::TensorRef;
    use parking_lot::Mutex;
    use sheetcap_core::error::OcrError;
    use sheetcap_core::ports::ocr_backend::{BackendKind, OcrBackend};

    use super::OnnxModelFiles;

    /// 검출 입력 정규화 (ImageNet 평균/표준편차)
    const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
    const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];
    /// 검출 확률 맵 이진화 임계값
    const DET_THRESH: f32 = 0.3;
    /// 박스 평균 점수 임계값
    const BOX_THRESH: f32 = 0.5;
    /// 박스 확장 비율
    const UNCLIP_RATIO: f32 = 1.6;
    /// 검출 입력 긴 변 상한
    const DET_LIMIT_SIDE: u32 = 960;
    /// 인식 입력 높이
    const REC_HEIGHT: u32 = 48;

    /// 셀 내부 글자 박스 (원본 좌표)
    #[derive(Debug, Clone, Copy, PartialEq)]
    struct TextBox {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    }

    /// ONNX Runtime 검출 + 인식 백엔드
    ///
    /// `Session::run`이 `&mut self`를 요구하므로 세션마다 Mutex로 감싼다.
    pub struct OnnxBackend {
        det_session: Mutex<Session>,
        rec_session: Mutex<Session>,
        characters: Vec<String>,
    }

    impl OnnxBackend {
        /// 모델 파일 로드
        pub fn load(files: &OnnxModelFiles, intra_threads: usize) -> Result<Self, OcrError> {
            let det_session = load_session(&files.detection, intra_threads)?;
            let rec_session = load_session(&files.recognition, intra_threads)?;
            let characters = load_character_dict(&files.dictionary)?;
            tracing::debug!("ONNX 문자 사전 로드: {}자", characters.len());

            Ok(Self {
                det_session: Mutex::new(det_session),
                rec_session: Mutex::new(rec_session),
                characters,
            })
        }

        fn detect(&self, image: &DynamicImage) -> Result<Vec<TextBox>, OcrError> {
            let (src_w, src_h) = image.dimensions();
            let Some(input) = preprocess_detection(image) else {
                return Ok(Vec::new());
            };

            let pred = {
                let mut session = self.det_session.lock();
                let tensor = TensorRef::from_array_view(&input)
                    .map_err(|e| OcrError::Inference(e.to_string()))?;
                let outputs = session
                    .run(inputs![tensor])
                    .map_err(|e| OcrError::Inference(format!("검출 추론 실패: {e}")))?;
                let output = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?;
                output
                    .into_owned()
                    .into_dimensionality::<Ix4>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?
            };

            let map = pred.index_axis(Axis(0), 0).index_axis_move(Axis(0), 0);
            Ok(postprocess_detection(map, (src_w, src_h)))
        }

        fn recognize_line(&self, line: &DynamicImage) -> Result<String, OcrError> {
            let input = preprocess_recognition(line);

            let pred = {
                let mut session = self.rec_session.lock();
                let tensor = TensorRef::from_array_view(&input)
                    .map_err(|e| OcrError::Inference(e.to_string()))?;
                let outputs = session
                    .run(inputs![tensor])
                    .map_err(|e| OcrError::Inference(format!("인식 추론 실패: {e}")))?;
                let output = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?;
                output
                    .into_owned()
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| OcrError::Inference(e.to_string()))?
            };

            Ok(ctc_decode(pred.index_axis(Axis(0), 0), &self.characters))
        }
    }

    impl OcrBackend for OnnxBackend {
        fn name(&self) -> &str {
            "onnx-ppocr"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Onnx
        }

        fn recognize(&self, patch: &DynamicImage) -> Result<String, OcrError> {
            if patch.width() == 0 || patch.height() == 0 {
                return Err(OcrError::EmptyImage);
            }

            let boxes = self.detect(patch)?;
            let mut lines = Vec::with_capacity(boxes.len());
            for b in boxes {
                let crop = patch.crop_imm(b.x, b.y, b.width, b.height);
                let text = self.recognize_line(&crop)?;
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            }
            Ok(lines.join(" "))
        }
    }

    fn load_session(path: &std::path::Path, intra_threads: usize) -> Result<Session, OcrError> {
        let build = || -> ort::Result<Session> {
            Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level1)?
                .with_intra_threads(intra_threads.max(1))?
                .commit_from_file(path)
        };
        build().map_err(|e| OcrError::ModelLoad(format!("{}: {e}", path.display())))
    }

    /// 사전 로드: 0번은 CTC blank, 마지막은 공백
    fn load_character_dict(path: &std::path::Path) -> Result<Vec<String>, OcrError> {
        let file = std::fs::File::open(path)?;
        let mut characters = vec!["blank".to_string()];
        for line in BufReader::new(file).lines() {
            let line = line?;
            let ch = line.trim_end_matches(['\r', '\n']);
            if !ch.is_empty() {
                characters.push(ch.to_string());
            }
        }
        characters.push(" ".to_string());
        Ok(characters)
    }

    /// 32의 배수 크기로 리사이즈 + 정규화 (1, 3, H, W)
    fn preprocess_detection(image: &DynamicImage) -> Option<Array4<f32>> {
        let (w, h) = image.dimensions();
        if w < 4 || h < 4 {
            return None;
        }
        let longest = w.max(h) as f32;
        let ratio = if longest > DET_LIMIT_SIDE as f32 {
            DET_LIMIT_SIDE as f32 / longest
        } else {
            1.0
        };
        let resize_w = (((w as f32 * ratio) / 32.0).round() as u32 * 32).max(32);
        let resize_h = (((h as f32 * ratio) / 32.0).round() as u32 * 32).max(32);

        let rgb = image
            .resize_exact(resize_w, resize_h, FilterType::CatmullRom)
            .to_rgb8();
        let mut array = Array3::<f32>::zeros((3, resize_h as usize, resize_w as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                array[[c, y as usize, x as usize]] =
                    (f32::from(pixel[c]) / 255.0 - DET_MEAN[c]) / DET_STD[c];
            }
        }
        Some(array.insert_axis(Axis(0)))
    }

    /// 확률 맵 → 글자 박스 (읽기 순서)
    fn postprocess_detection(pred: ArrayView2<f32>, src: (u32, u32)) -> Vec<TextBox> {
        let (height, width) = pred.dim();
        let (src_w, src_h) = src;

        let mut mask = GrayImage::new(width as u32, height as u32);
        for ((y, x), &v) in pred.indexed_iter() {
            if v > DET_THRESH {
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        let mask = dilate(&mask, Norm::L1, 1);

        let mut boxes = Vec::new();
        for contour in find_contours::<u32>(&mask) {
            if contour.points.is_empty() {
                continue;
            }
            let min_x = contour.points.iter().map(|p| p.x).min().unwrap_or(0) as f32;
            let max_x = contour.points.iter().map(|p| p.x).max().unwrap_or(0) as f32;
            let min_y = contour.points.iter().map(|p| p.y).min().unwrap_or(0) as f32;
            let max_y = contour.points.iter().map(|p| p.y).max().unwrap_or(0) as f32;
            if (max_x - min_x).min(max_y - min_y) < 3.0 {
                continue;
            }
            if box_score(&pred, min_x, min_y, max_x, max_y) < BOX_THRESH {
                continue;
            }

            // 직사각형 unclip: 넓이 * 비율 / 둘레 만큼 사방 확장
            let (bw, bh) = (max_x - min_x, max_y - min_y);
            let distance = bw * bh * UNCLIP_RATIO / (2.0 * (bw + bh));
            let scale_x = src_w as f32 / width as f32;
            let scale_y = src_h as f32 / height as f32;

            let x0 = ((min_x - distance) * scale_x).clamp(0.0, src_w as f32);
            let x1 = ((max_x + distance) * scale_x).clamp(0.0, src_w as f32);
            let y0 = ((min_y - distance) * scale_y).clamp(0.0, src_h as f32);
            let y1 = ((max_y + distance) * scale_y).clamp(0.0, src_h as f32);
            if x1 - x0 <= 3.0 || y1 - y0 <= 3.0 {
                continue;
            }

            boxes.push(TextBox {
                x: x0 as u32,
                y: y0 as u32,
                width: (x1 - x0) as u32,
                height: (y1 - y0) as u32,
            });
        }

        sort_reading_order(&mut boxes);
        boxes
    }

    fn box_score(pred: &ArrayView2<f32>, x0: f32, y0: f32, x1: f32, y1: f32) -> f32 {
        let (height, width) = pred.dim();
        let clamp = |v: f32, hi: usize| (v.max(0.0) as usize).min(hi.saturating_sub(1));
        let (xa, xb) = (clamp(x0.floor(), width), clamp(x1.ceil(), width));
        let (ya, yb) = (clamp(y0.floor(), height), clamp(y1.ceil(), height));

        let mut sum = 0.0f32;
        let mut count = 0usize;
        for y in ya..=yb {
            for x in xa..=xb {
                sum += pred[[y, x]];
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// 위→아래, 같은 줄(10px 이내)이면 왼→오
    fn sort_reading_order(boxes: &mut [TextBox]) {
        boxes.sort_by_key(|b| (b.y, b.x));
        for i in 1..boxes.len() {
            let mut j = i;
            while j > 0 && boxes[j].y.abs_diff(boxes[j - 1].y) < 10 && boxes[j].x < boxes[j - 1].x
            {
                boxes.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    /// 높이 48 고정 리사이즈 + [-1, 1] 정규화 (1, 3, 48, W)
    fn preprocess_recognition(line: &DynamicImage) -> Array4<f32> {
        let (w, h) = line.dimensions();
        let ratio = w as f32 / h.max(1) as f32;
        let target_w = ((REC_HEIGHT as f32 * ratio).ceil() as u32).max(1);

        let rgb = line
            .resize_exact(target_w, REC_HEIGHT, FilterType::CatmullRom)
            .to_rgb8();
        let mut array = Array3::<f32>::zeros((3, REC_HEIGHT as usize, target_w as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                array[[c, y as usize, x as usize]] = (f32::from(pixel[c]) / 255.0 - 0.5) / 0.5;
            }
        }
        array.insert_axis(Axis(0))
    }

    /// CTC greedy 디코딩: argmax → 연속 중복 제거 → blank 제거
    fn ctc_decode(preds: ArrayView2<f32>, characters: &[String]) -> String {
        let mut text = String::new();
        let mut prev: Option<usize> = None;
        for row in preds.rows() {
            let idx = row
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .map_or(0, |(i, _)| i);
            if idx != 0 && prev != Some(idx) {
                if let Some(ch) = characters.get(idx) {
                    text.push_str(ch);
                }
            }
            prev = Some(idx);
        }
        text
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use ndarray::Array2;

        fn chars() -> Vec<String> {
            ["blank", "a", "b", "c", " "]
                .iter()
                .map(|s| s.to_string())
                .collect()
        }

        fn one_hot(indices: &[usize], classes: usize) -> Array2<f32> {
            let mut preds = Array2::<f32>::zeros((indices.len(), classes));
            for (t, &i) in indices.iter().enumerate() {
                preds[[t, i]] = 1.0;
            }
            preds
        }

        #[test]
        fn ctc_collapses_repeats_and_blanks() {
            let preds = one_hot(&[1, 1, 0, 1, 2, 2, 0, 0, 3], 5);
            assert_eq!(ctc_decode(preds.view(), &chars()), "aabc");
        }

        #[test]
        fn ctc_all_blank_is_empty() {
            let preds = one_hot(&[0, 0, 0], 5);
            assert_eq!(ctc_decode(preds.view(), &chars()), "");
        }

        #[test]
        fn reading_order_within_line() {
            let mut boxes = vec![
                TextBox { x: 50, y: 12, width: 10, height: 10 },
                TextBox { x: 5, y: 40, width: 10, height: 10 },
                TextBox { x: 5, y: 15, width: 10, height: 10 },
            ];
            sort_reading_order(&mut boxes);
            let order: Vec<(u32, u32)> = boxes.iter().map(|b| (b.x, b.y)).collect();
            assert_eq!(order, vec![(5, 15), (50, 12), (5, 40)]);
        }

        #[test]
        fn detection_map_to_boxes() {
            let mut pred = Array2::<f32>::zeros((32, 64));
            for y in 8..20 {
                for x in 10..50 {
                    pred[[y, x]] = 0.9;
                }
            }
            let boxes = postprocess_detection(pred.view(), (128, 64));
            assert_eq!(boxes.len(), 1);
            let b = boxes[0];
            // 원본 좌표는 가로 2배, 세로 2배
            assert!(b.x <= 20 && b.x + b.width >= 98);
            assert!(b.y <= 16 && b.y + b.height >= 38);
        }

        #[test]
        fn tiny_patch_skips_detection() {
            assert!(preprocess_detection(&DynamicImage::new_rgb8(3, 30)).is_none());
            let input = preprocess_detection(&DynamicImage::new_rgb8(100, 20)).unwrap();
            assert_eq!(input.shape(), &[1, 3, 32, 96]);
        }
    }
}
