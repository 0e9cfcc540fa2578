use crate::field::{Axis, Field};
use crate::solver::filter::filter;
use crate::tape::{FieldVar, Tape};

/// Fixed Jacobi iteration count for the pressure solve. The projection runs
/// on a compute budget, not a convergence criterion, so differentiating the
/// unrolled loop always sees the same graph shape.
pub const PROJECT_ITERS: usize = 50;

/// Semi-Lagrangian advection of `f` through the velocity field `(vx, vy)`.
///
/// Each cell traces backward one step to `(i - vy, j - vx)` and bilinearly
/// interpolates the four surrounding source cells, wrapping at the edges.
/// The floored source indices are captured from forward values and treated
/// as constants (piecewise constant in the velocity, hence zero derivative);
/// the fractional weights stay on the tape so the interpolation is smooth in
/// the velocity.
pub fn advect(tape: &Tape, f: FieldVar, vx: FieldVar, vy: FieldVar) -> FieldVar {
    let vx_val = tape.value(vx);
    let vy_val = tape.value(vy);
    let (rows, cols) = vx_val.shape();
    let n = rows * cols;

    let mut row_anchor = Field::zeros(rows, cols);
    let mut col_anchor = Field::zeros(rows, cols);
    let mut top_left = vec![0usize; n];
    let mut top_right = vec![0usize; n];
    let mut bot_left = vec![0usize; n];
    let mut bot_right = vec![0usize; n];

    for i in 0..rows {
        for j in 0..cols {
            let k = i * cols + j;
            let src_y = i as f64 - vy_val.data()[k];
            let src_x = j as f64 - vx_val.data()[k];
            let floor_y = src_y.floor();
            let floor_x = src_x.floor();
            // Anchor minus the velocity var reproduces the fractional weight.
            row_anchor.data_mut()[k] = i as f64 - floor_y;
            col_anchor.data_mut()[k] = j as f64 - floor_x;

            let top = (floor_y as i64).rem_euclid(rows as i64) as usize;
            let bottom = (floor_y as i64 + 1).rem_euclid(rows as i64) as usize;
            let left = (floor_x as i64).rem_euclid(cols as i64) as usize;
            let right = (floor_x as i64 + 1).rem_euclid(cols as i64) as usize;
            top_left[k] = top * cols + left;
            top_right[k] = top * cols + right;
            bot_left[k] = bottom * cols + left;
            bot_right[k] = bottom * cols + right;
        }
    }

    // rw: weight of the lower source row, bw: weight of the right source col.
    let rw = tape.sub_from(row_anchor, vy);
    let bw = tape.sub_from(col_anchor, vx);
    let rw_c = tape.one_minus(rw);
    let bw_c = tape.one_minus(bw);

    let upper = tape.add(
        tape.mul(bw_c, tape.gather(f, top_left)),
        tape.mul(bw, tape.gather(f, top_right)),
    );
    let lower = tape.add(
        tape.mul(bw_c, tape.gather(f, bot_left)),
        tape.mul(bw, tape.gather(f, bot_right)),
    );
    tape.add(tape.mul(rw_c, upper), tape.mul(rw, lower))
}

/// Pressure projection toward a divergence-free velocity field.
///
/// Computes the central-difference divergence, solves the Poisson equation
/// with [`PROJECT_ITERS`] Jacobi sweeps (occlusion-filtering divergence and
/// pressure so the obstacle boundary stays continuous), subtracts the
/// pressure gradient, and zeroes the velocity inside the occlusion.
pub fn project(
    tape: &Tape,
    vx: FieldVar,
    vy: FieldVar,
    occlusion: FieldVar,
    width: f64,
) -> (FieldVar, FieldVar) {
    let dvx = tape.sub(tape.shift(vx, Axis::Col, -1), tape.shift(vx, Axis::Col, 1));
    let dvy = tape.sub(tape.shift(vy, Axis::Row, -1), tape.shift(vy, Axis::Row, 1));
    let mut div = tape.scale(tape.add(dvx, dvy), -0.5);
    div = filter(tape, div, occlusion, width);

    let (rows, cols) = tape.value(vx).shape();
    let mut p = tape.input(Field::zeros(rows, cols));
    for _ in 0..PROJECT_ITERS {
        let neighbors = tape.add(
            tape.add(tape.shift(p, Axis::Col, 1), tape.shift(p, Axis::Col, -1)),
            tape.add(tape.shift(p, Axis::Row, 1), tape.shift(p, Axis::Row, -1)),
        );
        p = tape.scale(tape.add(div, neighbors), 0.25);
        p = filter(tape, p, occlusion, width);
    }

    let grad_x = tape.scale(
        tape.sub(tape.shift(p, Axis::Col, -1), tape.shift(p, Axis::Col, 1)),
        0.5,
    );
    let grad_y = tape.scale(
        tape.sub(tape.shift(p, Axis::Row, -1), tape.shift(p, Axis::Row, 1)),
        0.5,
    );
    let vx = tape.sub(vx, grad_x);
    let vy = tape.sub(vy, grad_y);

    let non_occluded = tape.one_minus(occlusion);
    (tape.mul(vx, non_occluded), tape.mul(vy, non_occluded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::diagnostics;

    #[test]
    fn test_advect_zero_velocity_is_identity() {
        let tape = Tape::new();
        let f = tape.input(Field::from_vec(4, 5, (0..20).map(|i| i as f64).collect()));
        let vx = tape.input(Field::zeros(4, 5));
        let vy = tape.input(Field::zeros(4, 5));
        let out = tape.value(advect(&tape, f, vx, vy));
        for (o, e) in out.data().iter().zip(tape.value(f).data()) {
            assert!((o - e).abs() < 1e-12, "zero velocity should leave the field fixed");
        }
    }

    #[test]
    fn test_advect_unit_wind_shifts_right() {
        // vx = 1 everywhere traces each cell back to its left neighbor, so
        // advection acts as a one-column shift with wraparound.
        let tape = Tape::new();
        let f_val = Field::from_vec(4, 5, (0..20).map(|i| (i * i) as f64).collect());
        let f = tape.input(f_val.clone());
        let vx = tape.input(Field::filled(4, 5, 1.0));
        let vy = tape.input(Field::zeros(4, 5));
        let out = tape.value(advect(&tape, f, vx, vy));
        let expected = f_val.shift(Axis::Col, 1);
        for (o, e) in out.data().iter().zip(expected.data()) {
            assert!((o - e).abs() < 1e-12, "unit wind should shift by one column");
        }
    }

    #[test]
    fn test_advect_fractional_velocity_interpolates() {
        let tape = Tape::new();
        let f = tape.input(Field::from_vec(1, 4, vec![0.0, 1.0, 2.0, 3.0]));
        let vx = tape.input(Field::filled(1, 4, 0.5));
        let vy = tape.input(Field::zeros(1, 4));
        let out = tape.value(advect(&tape, f, vx, vy));
        // Cell 1 samples halfway between cells 0 and 1.
        assert!((out.get(0, 1) - 0.5).abs() < 1e-12);
        assert!((out.get(0, 2) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_project_reduces_exterior_divergence() {
        // Synthetic diverging velocity around a point source; a mild obstacle
        // mask sits downstream.
        let rows = 12;
        let cols = 16;
        let mut vx_val = Field::zeros(rows, cols);
        let mut vy_val = Field::zeros(rows, cols);
        for i in 0..rows {
            for j in 0..cols {
                let dy = i as f64 - 6.0;
                let dx = j as f64 - 5.0;
                let r2 = dx * dx + dy * dy + 1.0;
                vx_val.set(i, j, dx / r2);
                vy_val.set(i, j, dy / r2);
            }
        }
        let mut occ_val = Field::zeros(rows, cols);
        for i in 4..8 {
            for j in 10..13 {
                occ_val.set(i, j, 0.8);
            }
        }

        let before = diagnostics::exterior_divergence(&vx_val, &vy_val, &occ_val);
        let tape = Tape::new();
        let vx = tape.input(vx_val);
        let vy = tape.input(vy_val);
        let occ = tape.input(occ_val.clone());
        let (pvx, pvy) = project(&tape, vx, vy, occ, 1.0);
        let after =
            diagnostics::exterior_divergence(&tape.value(pvx), &tape.value(pvy), &occ_val);

        assert!(
            after < 0.5 * before,
            "projection should cut exterior divergence substantially: {} -> {}",
            before,
            after
        );
    }
}
