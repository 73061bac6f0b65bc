use crate::state::StateArray;
use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Noise tensor shape `(1, nvar, nodes, modes)`.
pub type NoiseShape = [usize; 4];

/// Shape a stochastic scheme needs for one node of a model.
pub fn single_node_shape(nvar: usize, modes: usize) -> NoiseShape {
    [1, nvar, 1, modes]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Noise intensity, either one value for every variable or one per variable.
    pub nsig: Vec<f64>,
    /// Correlation time; zero means white noise.
    pub ntau: f64,
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            nsig: vec![1.0],
            ntau: 0.0,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Process {
    White {
        shape: NoiseShape,
        sqrt_dt: f64,
    },
    Coloured {
        shape: NoiseShape,
        e: f64,
        sqrt_1_e2: f64,
        dt_sqrt_lambda: f64,
        eta: Vec<f64>,
    },
}

/// Additive noise with intensity `nsig`: increments are `sqrt(2 * nsig) * dW`.
///
/// `dW` is white (`sqrt(dt) * N(0, 1)`) when `ntau == 0`, otherwise an
/// Ornstein-Uhlenbeck process with correlation time `ntau`. The process has to be
/// configured for a shape before any increment is drawn; configuring reseeds the
/// generator, so a trajectory is reproducible from its configuration.
#[derive(Debug, Clone)]
pub struct Noise {
    config: NoiseConfig,
    rng: StdRng,
    process: Option<Process>,
}

impl Noise {
    pub fn additive(config: NoiseConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            process: None,
        }
    }

    pub fn is_coloured(&self) -> bool {
        self.config.ntau > 0.0
    }

    pub fn is_configured(&self) -> bool {
        self.process.is_some()
    }

    pub fn configure_white(&mut self, dt: f64, shape: NoiseShape) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.process = Some(Process::White {
            shape,
            sqrt_dt: dt.sqrt(),
        });
    }

    pub fn configure_coloured(&mut self, dt: f64, shape: NoiseShape) {
        self.rng = StdRng::seed_from_u64(self.config.seed);
        let tau = self.config.ntau;
        let e = (-dt / tau).exp();
        let len: usize = shape.iter().product();
        let eta: Vec<f64> = StandardNormal.sample_iter(&mut self.rng).take(len).collect();
        self.process = Some(Process::Coloured {
            shape,
            e,
            sqrt_1_e2: (1.0 - e * e).sqrt(),
            dt_sqrt_lambda: dt * (1.0 / tau).sqrt(),
            eta,
        });
    }

    /// Draws one Wiener increment `dW` for `shape`.
    pub fn generate(&mut self, shape: NoiseShape) -> Result<Vec<f64>> {
        let rng = &mut self.rng;
        match &mut self.process {
            None => bail!("Noise must be configured before generating increments."),
            Some(Process::White {
                shape: configured,
                sqrt_dt,
            }) => {
                check_shape(*configured, shape)?;
                let len: usize = shape.iter().product();
                Ok(StandardNormal
                    .sample_iter(rng)
                    .take(len)
                    .map(|z: f64| *sqrt_dt * z)
                    .collect())
            }
            Some(Process::Coloured {
                shape: configured,
                e,
                sqrt_1_e2,
                dt_sqrt_lambda,
                eta,
            }) => {
                check_shape(*configured, shape)?;
                for value in eta.iter_mut() {
                    let z: f64 = StandardNormal.sample(rng);
                    *value = *value * *e + *sqrt_1_e2 * z;
                }
                Ok(eta.iter().map(|value| *dt_sqrt_lambda * value).collect())
            }
        }
    }

    /// Noise coefficient for a state variable.
    pub fn gfun(&self, var: usize) -> f64 {
        let nsig = match self.config.nsig.as_slice() {
            [single] => *single,
            per_var => per_var.get(var).copied().unwrap_or(0.0),
        };
        (2.0 * nsig).sqrt()
    }

    /// `gfun(x) * dW` for a state of the model's shape.
    pub fn increment(&mut self, state: &StateArray) -> Result<StateArray> {
        let shape = single_node_shape(state.nvar(), state.modes());
        let dw = self.generate(shape)?;
        let mut out = StateArray::from_vec(state.nvar(), state.modes(), dw)?;
        for var in 0..state.nvar() {
            let g = self.gfun(var);
            for value in out.variable_mut(var) {
                *value *= g;
            }
        }
        Ok(out)
    }
}

fn check_shape(configured: NoiseShape, requested: NoiseShape) -> Result<()> {
    if configured != requested {
        bail!(
            "Noise configured for shape {:?} but {:?} was requested.",
            configured,
            requested
        );
    }
    Ok(())
}
