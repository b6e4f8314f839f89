//! 1차원 선 커널 모폴로지 열림(opening).
//!
//! 길이 `k`인 가로/세로 선 커널로 침식 후 팽창하면, 해당 방향으로
//! 길이가 `k` 이상인 전경 연속 구간만 남는다. 연산은 `imageproc::morphology`.
//!
//! 커널 길이는 홀수로 올려 중심이 가운데에 오게 한다(짝수면 결과가 한 픽셀 밀린다).

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_open, Mask};

use crate::binarize::FOREGROUND;

/// 커널 길이 상한 (`Mask` 중심 좌표가 u8)
pub const MAX_KERNEL_LEN: u32 = 511;

/// 가로 방향 열림 — 길이 `kernel_len` 이상인 가로 구간만 유지
pub fn open_horizontal(mask: &GrayImage, kernel_len: u32) -> GrayImage {
    grayscale_open(mask, &line_kernel(kernel_len, true))
}

/// 세로 방향 열림 — 길이 `kernel_len` 이상인 세로 구간만 유지
pub fn open_vertical(mask: &GrayImage, kernel_len: u32) -> GrayImage {
    grayscale_open(mask, &line_kernel(kernel_len, false))
}

fn line_kernel(kernel_len: u32, horizontal: bool) -> Mask {
    let len = kernel_len.clamp(1, MAX_KERNEL_LEN) | 1;
    let center = (len / 2) as u8;
    if horizontal {
        Mask::from_image(&GrayImage::from_pixel(len, 1, Luma([FOREGROUND])), center, 0)
    } else {
        Mask::from_image(&GrayImage::from_pixel(1, len, Luma([FOREGROUND])), 0, center)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> GrayImage {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len()) as u32;
        let mut mask = GrayImage::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.chars().enumerate() {
                if c == '#' {
                    mask.put_pixel(x as u32, y as u32, Luma([FOREGROUND]));
                }
            }
        }
        mask
    }

    #[test]
    fn horizontal_keeps_long_runs_only() {
        let mask = mask_from(&[
            "######..##", //
            "#.#.#.#.#.",
            "..#####...",
        ]);
        let opened = open_horizontal(&mask, 5);

        assert_eq!(opened, mask_from(&["######....", "..........", "..#####..."]));
    }

    #[test]
    fn vertical_keeps_long_runs_only() {
        let mask = mask_from(&[
            "#..", //
            "#.#",
            "#..",
            "#.#",
        ]);
        let opened = open_vertical(&mask, 3);

        assert_eq!(opened, mask_from(&["#..", "#..", "#..", "#.."]));
    }

    #[test]
    fn kernel_of_one_is_identity() {
        let mask = mask_from(&["#.#", ".#."]);
        assert_eq!(open_horizontal(&mask, 1), mask);
        assert_eq!(open_vertical(&mask, 0), mask);
    }

    #[test]
    fn even_kernel_does_not_shift_lines() {
        let mask = mask_from(&["..######..", "...##....."]);
        let opened = open_horizontal(&mask, 4);
        assert_eq!(opened, mask_from(&["..######..", ".........."]));
    }
}
