//! 적응형 이진화.
//!
//! 반전된 밝기 이미지에 평균 기반 적응형 임계값을 적용해
//! 어두운 선/글자를 전경(255)으로 만든다. 창 평균은 `imageproc` 적분 영상으로 계산.

use image::{imageops, GrayImage, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// 마스크 전경 값
pub const FOREGROUND: u8 = 255;

/// 반전 + 적응형 평균 임계값
///
/// `inv(p) > mean(window) - offset` 이면 전경.
/// 창은 `block_size` 정사각형이며 이미지 경계에서 잘린다.
pub fn adaptive_threshold_inverted(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut mask = GrayImage::new(width, height);
    if width == 0 || height == 0 {
        return mask;
    }

    let mut inverted = gray.clone();
    imageops::invert(&mut inverted);
    let integral = integral_image::<_, u64>(&inverted);
    let radius = block_size.max(1) / 2;

    for y in 0..height {
        let y0 = y.saturating_sub(radius);
        let y1 = (y + radius).min(height - 1);
        for x in 0..width {
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(width - 1);

            let area = i64::from((x1 - x0 + 1) * (y1 - y0 + 1));
            let sum = sum_image_pixels(&integral, x0, y0, x1, y1)[0] as i64;
            let inv = i64::from(inverted.get_pixel(x, y)[0]);

            // inv > sum/area - offset 를 정수로 비교
            if inv * area > sum - i64::from(offset) * area {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    mask
}
