use std::time::Instant;

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::field::Field;
use crate::shape;
use crate::solver::{simulate, Frame};
use crate::tape::{FieldVar, ScalarVar, Tape};

/// Objective value and its gradient with respect to the shape parameters.
pub struct Evaluation {
    pub objective: f64,
    pub gradient: Field,
}

/// Everything an optimization run produces: one trajectory per recorded
/// parameter state (initial plus one per step), the objective value seen at
/// each step, and the final parameters.
pub struct RunOutput {
    pub simulations: Vec<Vec<Frame>>,
    pub objectives: Vec<f64>,
    pub params: Field,
}

/// Build the full differentiable pipeline on a fresh tape: constrain the
/// parameters to an occlusion mask, run the tunnel, and assemble the
/// objective `lift/drag + mass_coeff * mean(positive occlusion)`.
fn build_objective(
    tape: &Tape,
    config: &Config,
    template: &Field,
    params: &Field,
) -> Result<(FieldVar, ScalarVar, Vec<Frame>)> {
    let rows = config.rows();
    let cols = config.cols();
    ensure!(
        params.shape() == (rows, cols),
        "parameter grid is {:?}, tunnel is {}x{}",
        params.shape(),
        rows,
        cols
    );

    let params_var = tape.input(params.clone());
    let occlusion = shape::constrain_occlusion(tape, params_var, template);

    let init_vx = tape.input(Field::filled(rows, cols, config.wind_speed));
    let init_vy = tape.input(Field::zeros(rows, cols));
    let (final_vx, final_vy, frames) = simulate(tape, config, init_vx, init_vy, occlusion);

    // Lift opposes the mean downward deflection; drag is the mean loss of
    // forward momentum. Near-zero drag leaves the ratio ill-conditioned,
    // which the caller detects as a non-finite objective.
    let lift = tape.scalar_neg(tape.mean(tape.sub(final_vy, init_vy)));
    let drag = tape.mean(tape.sub(final_vx, init_vx));
    let ratio = tape.scalar_div(lift, drag);

    let mass = tape.scalar_scale(tape.mean_positive(occlusion), config.mass_coeff);
    let objective = tape.scalar_add(ratio, mass);
    Ok((params_var, objective, frames))
}

/// One differentiable evaluation: objective plus exact reverse-mode gradient.
pub fn evaluate(config: &Config, template: &Field, params: &Field) -> Result<Evaluation> {
    let tape = Tape::new();
    let (params_var, objective, _frames) = build_objective(&tape, config, template, params)?;
    let value = tape.scalar(objective);
    let gradient = tape
        .gradient(objective)
        .wrt(params_var)
        .unwrap_or_else(|| Field::zeros(config.rows(), config.cols()));
    Ok(Evaluation { objective: value, gradient })
}

/// Forward-only evaluation for logging and rendering.
pub fn forward(config: &Config, template: &Field, params: &Field) -> Result<(f64, Vec<Frame>)> {
    let tape = Tape::new();
    let (_, objective, frames) = build_objective(&tape, config, template, params)?;
    Ok((tape.scalar(objective), frames))
}

fn progress_line(step: usize, objective: f64, elapsed: f64) -> String {
    format!("step: {step}, lift/drag ratio: {objective:.2e}, wallclock dt: {elapsed:.2}s")
}

/// Seed the shape parameters with `noise_coeff * U[0,1) - 1`: mostly closed
/// (sigmoid of roughly -1), with a little noise to break symmetry.
pub fn initial_params(config: &Config) -> Field {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.rows() * config.cols();
    Field::from_vec(
        config.rows(),
        config.cols(),
        (0..n).map(|_| config.noise_coeff * rng.gen::<f64>() - 1.0).collect(),
    )
}

/// Gradient-ascent optimization of the wing shape.
///
/// Runs `optimization_steps` fixed-rate ascent steps, re-simulating at the
/// updated parameters after every step for the trajectory log, and printing
/// progress every `print_every` steps. A non-finite objective aborts the run
/// rather than being clamped.
pub fn run(config: &Config) -> Result<RunOutput> {
    let template = shape::region_template(config.rows(), config.cols(), config.region);
    let mut params = initial_params(config);

    let (_, initial_frames) = forward(config, &template, &params)?;
    let mut simulations = vec![initial_frames];
    let mut objectives = Vec::with_capacity(config.optimization_steps);

    let mut t0 = Instant::now();
    for step in 0..config.optimization_steps {
        let eval = evaluate(config, &template, &params)?;
        ensure!(
            eval.objective.is_finite(),
            "objective became non-finite at step {} (ill-conditioned drag or filter width)",
            step + 1
        );
        objectives.push(eval.objective);

        params = params.zip_with(&eval.gradient, |p, g| p + config.learning_rate * g);

        let (_, frames) = forward(config, &template, &params)?;
        simulations.push(frames);

        if (step + 1) % config.print_every == 0 {
            println!(
                "{}",
                progress_line(step + 1, eval.objective, t0.elapsed().as_secs_f64())
            );
            t0 = Instant::now();
        }
    }
    Ok(RunOutput { simulations, objectives, params })
}
