use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};

use crate::solver::Frame;

/// Map a frame to an RGB image: red smoke in R, the occlusion mask in G,
/// blue smoke in B, each clamped to [0, 1] and scaled to 8 bits.
pub fn frame_to_image(frame: &Frame) -> RgbImage {
    let (rows, cols) = frame.red.shape();
    let mut img = RgbImage::new(cols as u32, rows as u32);
    for i in 0..rows {
        for j in 0..cols {
            img.put_pixel(
                j as u32,
                i as u32,
                Rgb([
                    to_byte(frame.red.get(i, j)),
                    to_byte(frame.occlusion.get(i, j)),
                    to_byte(frame.blue.get(i, j)),
                ]),
            );
        }
    }
    img
}

pub fn save_frame(frame: &Frame, path: &Path) -> Result<()> {
    frame_to_image(frame)
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn to_byte(v: f64) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;

    #[test]
    fn test_frame_channels_map_to_pixels() {
        let mut red = Field::zeros(2, 3);
        red.set(0, 1, 1.0);
        let mut occ = Field::zeros(2, 3);
        occ.set(1, 2, 0.5);
        let blue = Field::filled(2, 3, 2.0); // out of range, should clamp
        let img = frame_to_image(&Frame { red, occlusion: occ, blue });
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(1, 0)[0], 255, "red smoke lands in the R channel");
        assert_eq!(img.get_pixel(2, 1)[1], 127, "occlusion lands in the G channel");
        assert_eq!(img.get_pixel(0, 0)[2], 255, "blue channel clamps to full");
    }

    #[test]
    fn test_negative_values_clamp_to_zero() {
        let frame = Frame {
            red: Field::filled(1, 1, -0.5),
            occlusion: Field::zeros(1, 1),
            blue: Field::zeros(1, 1),
        };
        let img = frame_to_image(&frame);
        assert_eq!(img.get_pixel(0, 0)[0], 0);
    }
}
