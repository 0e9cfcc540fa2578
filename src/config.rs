use anyhow::{bail, Result};
use serde::Deserialize;

/// Obstacle region template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Rectangle,
    Oval,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tunnel grid as [rows, cols].
    pub tunnel_shape: [usize; 2],
    pub learning_rate: f64,
    pub wind_speed: f64,
    /// Weight of the mass penalty added to the lift/drag objective.
    pub mass_coeff: f64,
    /// Amplitude of the uniform noise seeding the shape parameters.
    pub noise_coeff: f64,
    pub print_every: usize,
    /// Gaussian width of the occlusion filter.
    pub filter_width: f64,
    pub seed: u64,
    pub region: RegionKind,
    pub simulator_steps: usize,
    pub optimization_steps: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tunnel_shape: [50, 75],
            learning_rate: 1e3,
            wind_speed: 1.0,
            mass_coeff: 0.0,
            noise_coeff: 1e-1,
            print_every: 2,
            filter_width: 1.0,
            seed: 0,
            region: RegionKind::Rectangle,
            simulator_steps: 20,
            optimization_steps: 20,
        }
    }
}

impl Config {
    pub fn rows(&self) -> usize {
        self.tunnel_shape[0]
    }

    pub fn cols(&self) -> usize {
        self.tunnel_shape[1]
    }

    /// Reject degenerate setups before any simulation work starts.
    pub fn validate(&self) -> Result<()> {
        // The boundary enforcer overwrites 3-row/3-column inflow bands and
        // the smoke sources sit at quarter-height, so tiny tunnels leave no
        // interior to simulate.
        if self.rows() < 8 || self.cols() < 8 {
            bail!(
                "tunnel_shape {}x{} is too small; need at least 8x8",
                self.rows(),
                self.cols()
            );
        }
        if self.filter_width <= 0.0 {
            bail!("filter_width must be positive, got {}", self.filter_width);
        }
        if self.simulator_steps == 0 {
            bail!("simulator_steps must be at least 1");
        }
        if self.print_every == 0 {
            bail!("print_every must be at least 1");
        }
        Ok(())
    }
}

pub fn load() -> Config {
    let path = std::path::Path::new("venturi.yaml");
    if path.exists() {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Warning: failed to parse venturi.yaml: {e}; using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: failed to read venturi.yaml: {e}; using defaults");
                Config::default()
            }
        }
    } else {
        Config::default()
    }
}
