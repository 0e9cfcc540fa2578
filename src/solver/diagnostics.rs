use crate::field::{Axis, Field};

/// Central-difference divergence of the velocity field, matching the
/// stencil the pressure projection targets (without the -0.5 sign flip).
pub fn divergence(vx: &Field, vy: &Field) -> Field {
    let dvx = vx.shift(Axis::Col, -1).zip_with(&vx.shift(Axis::Col, 1), |a, b| a - b);
    let dvy = vy.shift(Axis::Row, -1).zip_with(&vy.shift(Axis::Row, 1), |a, b| a - b);
    dvx.zip_with(&dvy, |a, b| 0.5 * (a + b))
}

/// Mean absolute divergence over the cells essentially outside the
/// occlusion. Inside the obstacle the velocity is forced to zero, so only
/// the free-flow region says anything about mass conservation.
pub fn exterior_divergence(vx: &Field, vy: &Field, occlusion: &Field) -> f64 {
    let div = divergence(vx, vy);
    let mut total = 0.0;
    let mut count = 0usize;
    for (d, m) in div.data().iter().zip(occlusion.data()) {
        if *m < 0.1 {
            total += d.abs();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_flow_is_divergence_free() {
        let vx = Field::filled(6, 8, 1.5);
        let vy = Field::filled(6, 8, -0.3);
        let div = divergence(&vx, &vy);
        assert!(div.max_abs() < 1e-12, "uniform flow should have zero divergence");
    }

    #[test]
    fn test_point_source_has_positive_divergence() {
        let mut vx = Field::zeros(7, 7);
        // Outflow to the right of the center, inflow from the left.
        vx.set(3, 4, 1.0);
        vx.set(3, 2, -1.0);
        let vy = Field::zeros(7, 7);
        let div = divergence(&vx, &vy);
        assert!(div.get(3, 3) > 0.0, "cell between the jets should be a source");
    }

    #[test]
    fn test_exterior_divergence_ignores_occluded_cells() {
        let mut vx = Field::zeros(5, 5);
        vx.set(2, 3, 10.0);
        let vy = Field::zeros(5, 5);
        // Mask out the whole neighborhood carrying the divergence.
        let mut occ = Field::zeros(5, 5);
        for j in 0..5 {
            occ.set(2, j, 1.0);
        }
        let masked = exterior_divergence(&vx, &vy, &occ);
        let open = exterior_divergence(&vx, &vy, &Field::zeros(5, 5));
        assert!(open > 0.0);
        assert!(masked < open, "masking the divergent row should lower the measure");
    }
}
