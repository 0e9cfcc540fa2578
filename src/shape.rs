use crate::config::RegionKind;
use crate::field::Field;
use crate::tape::{FieldVar, Tape};

/// 0/1 mask of the cells the wing is allowed to occupy.
///
/// The rectangle spans rows [0.3r, 0.68r) and columns [0.12c, 0.62c). The
/// oval is a squashed ellipse centered at (0.5r, 0.45c) with horizontal
/// radius 0.45r and a 5x row penalty, all bounds truncated to integers.
pub fn region_template(rows: usize, cols: usize, kind: RegionKind) -> Field {
    let mut template = Field::zeros(rows, cols);
    match kind {
        RegionKind::Rectangle => {
            let r0 = (0.3 * rows as f64) as usize;
            let r1 = (0.68 * rows as f64) as usize;
            let c0 = (0.12 * cols as f64) as usize;
            let c1 = (0.62 * cols as f64) as usize;
            for i in r0..r1 {
                for j in c0..c1 {
                    template.set(i, j, 1.0);
                }
            }
        }
        RegionKind::Oval => {
            let er = (rows as f64 * 0.5) as i64;
            let ec = (cols as f64 * 0.45) as i64;
            let rad = (rows as f64 * 0.45) as i64;
            for i in 0..rows {
                for j in 0..cols {
                    let y = i as i64 - er;
                    let x = j as i64 - ec;
                    if x * x + 5 * y * y <= rad * rad {
                        template.set(i, j, 1.0);
                    }
                }
            }
        }
    }
    template
}

/// Map unconstrained parameters to a valid occlusion mask:
/// `sigmoid(params) * template`, so every cell lands in [0, 1] and cells
/// outside the region template are exactly zero regardless of the params.
pub fn constrain_occlusion(tape: &Tape, params: FieldVar, template: &Field) -> FieldVar {
    let squashed = tape.sigmoid(params);
    tape.mul_const(squashed, template.clone())
}
