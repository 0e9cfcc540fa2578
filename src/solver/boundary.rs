use crate::config::Config;
use crate::field::Field;
use crate::tape::{FieldVar, Tape};

/// Which physical field a boundary band is being written into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    RedSmoke,
    BlueSmoke,
    Vx,
    Vy,
}

/// Width of the non-wrapping boundary bands, in cells.
pub const BAND: usize = 3;

/// Overwrite the tunnel's inflow boundaries.
///
/// The top three rows are cleared for every field, breaking the vertical
/// wraparound. The left three columns inject the inflow: red smoke at 0.9
/// over rows [rows/4, rows/2), blue smoke at 0.9 over [rows/2, 3*rows/4),
/// horizontal velocity at the configured wind speed, vertical velocity zero.
/// Band cells are constant injections, so no gradient flows through them.
pub fn enforce_boundary(
    tape: &Tape,
    f: FieldVar,
    kind: FieldKind,
    config: &Config,
) -> FieldVar {
    let rows = config.rows();
    let cols = config.cols();

    let top_wall = Field::zeros(BAND, cols);
    let mut left_wall = Field::zeros(rows, BAND);
    match kind {
        FieldKind::RedSmoke => {
            for i in rows / 4..rows / 2 {
                for j in 0..BAND {
                    left_wall.set(i, j, 0.9);
                }
            }
        }
        FieldKind::BlueSmoke => {
            for i in rows / 2..3 * rows / 4 {
                for j in 0..BAND {
                    left_wall.set(i, j, 0.9);
                }
            }
        }
        FieldKind::Vx => {
            left_wall = Field::filled(rows, BAND, config.wind_speed);
        }
        FieldKind::Vy => {}
    }

    // Top rows first, then left columns; the left wall wins in the corner.
    let f = tape.replace_top_rows(f, top_wall);
    tape.replace_left_cols(f, left_wall)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config { tunnel_shape: [12, 16], wind_speed: 2.0, ..Config::default() }
    }

    #[test]
    fn test_red_smoke_band() {
        let cfg = test_config();
        let tape = Tape::new();
        let f = tape.input(Field::filled(12, 16, 0.5));
        let out = tape.value(enforce_boundary(&tape, f, FieldKind::RedSmoke, &cfg));
        assert_eq!(out.get(3, 0), 0.9, "red inflow occupies rows/4..rows/2");
        assert_eq!(out.get(5, 2), 0.9);
        assert_eq!(out.get(6, 0), 0.0, "below the red band the wall is empty");
        assert_eq!(out.get(2, 0), 0.0, "above the red band the wall is empty");
        assert_eq!(out.get(5, 5), 0.5, "interior is untouched");
    }

    #[test]
    fn test_blue_smoke_band() {
        let cfg = test_config();
        let tape = Tape::new();
        let f = tape.input(Field::filled(12, 16, 0.5));
        let out = tape.value(enforce_boundary(&tape, f, FieldKind::BlueSmoke, &cfg));
        assert_eq!(out.get(6, 0), 0.9, "blue inflow occupies rows/2..3*rows/4");
        assert_eq!(out.get(8, 2), 0.9);
        assert_eq!(out.get(9, 0), 0.0);
        assert_eq!(out.get(5, 0), 0.0);
    }

    #[test]
    fn test_wind_inflow_and_top_wall() {
        let cfg = test_config();
        let tape = Tape::new();
        let f = tape.input(Field::filled(12, 16, -1.0));
        let out = tape.value(enforce_boundary(&tape, f, FieldKind::Vx, &cfg));
        assert_eq!(out.get(7, 1), 2.0, "left wall carries the wind speed");
        assert_eq!(out.get(1, 1), 2.0, "left wall overwrites the top corner");
        assert_eq!(out.get(1, 8), 0.0, "top rows outside the corner are cleared");
        assert_eq!(out.get(7, 8), -1.0, "interior is untouched");
    }

    #[test]
    fn test_vy_band_is_zero() {
        let cfg = test_config();
        let tape = Tape::new();
        let f = tape.input(Field::filled(12, 16, 3.0));
        let out = tape.value(enforce_boundary(&tape, f, FieldKind::Vy, &cfg));
        assert_eq!(out.get(7, 0), 0.0, "vy inflow is quiescent");
        assert_eq!(out.get(0, 8), 0.0, "top wall is cleared");
        assert_eq!(out.get(7, 8), 3.0, "interior is untouched");
    }
}
