pub mod boundary;
pub mod core;
pub mod diagnostics;
pub mod filter;

use crate::config::Config;
use crate::field::Field;
use crate::tape::{FieldVar, Tape};

use self::boundary::{enforce_boundary, FieldKind};
use self::core::{advect, project};

/// One rendered time step: the three channels of the visualization.
#[derive(Clone, Debug)]
pub struct Frame {
    pub red: Field,
    pub occlusion: Field,
    pub blue: Field,
}

/// Run the wind tunnel for `config.simulator_steps` steps on the tape.
///
/// Seeds the smoke bands, projects the initial velocity once, then per step:
/// self-advects the velocity, projects it, advects and occludes both dyes,
/// and re-applies the inflow boundaries. Returns the final velocity vars and
/// the per-step frames (including the initial state).
pub fn simulate(
    tape: &Tape,
    config: &Config,
    vx: FieldVar,
    vy: FieldVar,
    occlusion: FieldVar,
) -> (FieldVar, FieldVar, Vec<Frame>) {
    let rows = config.rows();
    let cols = config.cols();
    let width = config.filter_width;

    let mut red_val = Field::zeros(rows, cols);
    let mut blue_val = Field::zeros(rows, cols);
    for i in rows / 4..rows / 2 {
        for j in 0..cols {
            red_val.set(i, j, 0.9);
        }
    }
    for i in rows / 2..3 * rows / 4 {
        for j in 0..cols {
            blue_val.set(i, j, 0.9);
        }
    }
    let mut red = tape.input(red_val);
    let mut blue = tape.input(blue_val);

    let occlusion_val = tape.value(occlusion);
    let non_occluded = tape.one_minus(occlusion);

    let mut frames = Vec::with_capacity(config.simulator_steps + 1);
    frames.push(Frame {
        red: tape.value(red),
        occlusion: occlusion_val.clone(),
        blue: tape.value(blue),
    });

    let (mut vx, mut vy) = project(tape, vx, vy, occlusion, width);
    for _ in 0..config.simulator_steps {
        let vx_advected = advect(tape, vx, vx, vy);
        let vy_advected = advect(tape, vy, vx, vy);
        let projected = project(tape, vx_advected, vy_advected, occlusion, width);
        vx = projected.0;
        vy = projected.1;

        red = tape.mul(advect(tape, red, vx, vy), non_occluded);
        blue = tape.mul(advect(tape, blue, vx, vy), non_occluded);

        red = enforce_boundary(tape, red, FieldKind::RedSmoke, config);
        blue = enforce_boundary(tape, blue, FieldKind::BlueSmoke, config);
        vx = enforce_boundary(tape, vx, FieldKind::Vx, config);
        vy = enforce_boundary(tape, vy, FieldKind::Vy, config);

        frames.push(Frame {
            red: tape.value(red),
            occlusion: occlusion_val.clone(),
            blue: tape.value(blue),
        });
    }
    (vx, vy, frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> Config {
        Config {
            tunnel_shape: [12, 16],
            simulator_steps: 3,
            wind_speed: 1.0,
            filter_width: 1.0,
            ..Config::default()
        }
    }

    #[test]
    fn test_simulate_frame_count_and_shapes() {
        let cfg = small_config();
        let tape = Tape::new();
        let vx = tape.input(Field::filled(12, 16, cfg.wind_speed));
        let vy = tape.input(Field::zeros(12, 16));
        let occ = tape.input(Field::zeros(12, 16));
        let (_, _, frames) = simulate(&tape, &cfg, vx, vy, occ);
        assert_eq!(frames.len(), cfg.simulator_steps + 1, "initial frame plus one per step");
        for frame in &frames {
            assert_eq!(frame.red.shape(), (12, 16));
            assert_eq!(frame.blue.shape(), (12, 16));
            assert_eq!(frame.occlusion.shape(), (12, 16));
        }
    }

    #[test]
    fn test_initial_frame_has_smoke_bands() {
        let cfg = small_config();
        let tape = Tape::new();
        let vx = tape.input(Field::filled(12, 16, 1.0));
        let vy = tape.input(Field::zeros(12, 16));
        let occ = tape.input(Field::zeros(12, 16));
        let (_, _, frames) = simulate(&tape, &cfg, vx, vy, occ);
        let first = &frames[0];
        assert_eq!(first.red.get(4, 8), 0.9, "red band spans rows/4..rows/2");
        assert_eq!(first.blue.get(7, 8), 0.9, "blue band spans rows/2..3*rows/4");
        assert_eq!(first.red.get(8, 8), 0.0);
        assert_eq!(first.blue.get(4, 8), 0.0);
    }

    #[test]
    fn test_smoke_drifts_downwind() {
        // With a left-to-right wind and no obstacle, red smoke mass right of
        // the inflow should grow as the band is carried downstream.
        let cfg = Config { simulator_steps: 4, ..small_config() };
        let tape = Tape::new();
        let vx = tape.input(Field::filled(12, 16, 1.0));
        let vy = tape.input(Field::zeros(12, 16));
        let occ = tape.input(Field::zeros(12, 16));
        let (_, _, frames) = simulate(&tape, &cfg, vx, vy, occ);
        let right_mass = |f: &Field| -> f64 {
            (0..12).map(|i| (8..16).map(|j| f.get(i, j)).sum::<f64>()).sum()
        };
        let first = right_mass(&frames[0].red);
        let last = right_mass(&frames.last().expect("at least one frame").red);
        assert!(last > 0.0, "smoke should reach the right half");
        assert!(last >= first * 0.5, "downstream smoke should persist");
    }

    #[test]
    fn test_velocity_zero_inside_solid_obstacle() {
        let cfg = small_config();
        let mut occ_val = Field::zeros(12, 16);
        for i in 4..8 {
            for j in 6..10 {
                occ_val.set(i, j, 1.0);
            }
        }
        let tape = Tape::new();
        let vx = tape.input(Field::filled(12, 16, 1.0));
        let vy = tape.input(Field::zeros(12, 16));
        let occ = tape.input(occ_val);
        let (fvx, fvy, _) = simulate(&tape, &cfg, vx, vy, occ);
        let vx_val = tape.value(fvx);
        let vy_val = tape.value(fvy);
        // Interior obstacle cells (outside the boundary bands) are occluded
        // right before the boundary pass and stay exactly zero.
        for i in 4..8 {
            for j in 6..10 {
                assert_eq!(vx_val.get(i, j), 0.0, "vx must vanish inside the obstacle");
                assert_eq!(vy_val.get(i, j), 0.0, "vy must vanish inside the obstacle");
            }
        }
    }
}
