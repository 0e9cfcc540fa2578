mod config;
mod field;
mod optimize;
mod render;
mod shape;
mod solver;
mod tape;

use std::path::Path;

use anyhow::{Context, Result};

fn main() -> Result<()> {
    let cfg = config::load();
    cfg.validate()?;

    println!(
        "venturi: {}x{} tunnel, {:?} region, {} simulator steps, {} optimization steps",
        cfg.rows(),
        cfg.cols(),
        cfg.region,
        cfg.simulator_steps,
        cfg.optimization_steps
    );

    let out = optimize::run(&cfg)?;

    let dir = Path::new("out");
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    // Snapshot the end state of the first, middle, and final trajectories.
    let mid = out.simulations.len() / 2;
    let last = out.simulations.len() - 1;
    for (name, index) in [("initial.png", 0), ("during.png", mid), ("final.png", last)] {
        let frames = &out.simulations[index];
        if let Some(frame) = frames.last() {
            render::save_frame(frame, &dir.join(name))?;
        }
    }

    if let Some(objective) = out.objectives.last() {
        println!("final lift/drag ratio: {:.2e}", objective);
    }
    println!("wrote snapshots to {}", dir.display());
    Ok(())
}
