use crate::tape::{FieldVar, Tape};

/// Normalized-convolution occlusion filter.
///
/// Splits `f` into the part outside the occlusion (kept as-is) and the part
/// inside (replaced by a blur of the exterior values, renormalized by the
/// blurred free-space mask so that solid regions do not dilute the signal).
/// The result diffuses exterior values smoothly into the obstacle, making it
/// semi-permeable and keeping the boundary differentiable.
///
/// A mask close to 1 over a region wider than the blur kernel drives the
/// denominator toward zero there; the quotient then blows up and surfaces as
/// a non-finite objective in the optimization loop rather than being clamped
/// here.
pub fn filter(tape: &Tape, f: FieldVar, occlusion: FieldVar, width: f64) -> FieldVar {
    let non_occluded = tape.one_minus(occlusion);
    let diffused = tape.div(
        tape.blur(tape.mul(f, non_occluded), width),
        tape.blur(non_occluded, width),
    );
    let outside = tape.mul(non_occluded, f);
    let inside = tape.mul(occlusion, diffused);
    tape.add(outside, inside)
}
