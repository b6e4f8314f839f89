//! # sheetcap-vision
//!
//! 표 이미지 처리 크레이트.
//! 래스터 이미지에서 표 격자를 찾아 셀로 나누고, 셀마다 OCR 캐스케이드로
//! 텍스트를 인식해 스프레드시트에 붙여넣을 수 있는 표를 만든다.
//!
//! 처리 순서: [`image_source`] → [`grid_detector`] → [`segmenter`] → [`assembler`] → [`serializer`]

pub mod assembler;
pub mod binarize;
pub mod grid_detector;
pub mod image_source;
pub mod morphology;
pub mod ocr;
pub mod pipeline;
pub mod segmenter;
pub mod serializer;
