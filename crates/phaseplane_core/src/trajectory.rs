use crate::noise::single_node_shape;
use crate::state::{Clamp, StateArray};
use crate::traits::{Integrator, Model};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_TRAJECTORY_STEPS: usize = 4096;

/// States visited by a clamped forward integration, with their times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<StateArray>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Time series of one variable in one mode.
    pub fn series(&self, var: usize, mode: usize) -> Vec<f64> {
        self.states.iter().map(|s| s.get(var, mode)).collect()
    }

    /// The path projected onto the (x, y) plane for one mode.
    pub fn path(&self, x_index: usize, y_index: usize, mode: usize) -> Vec<[f64; 2]> {
        self.states
            .iter()
            .map(|s| [s.get(x_index, mode), s.get(y_index, mode)])
            .collect()
    }
}

/// Integrates `steps` times from `initial`, holding every variable in `held` at its
/// initial value.
///
/// A stochastic scheme gets its noise configured for `(1, nvar, 1, modes)` once, before
/// the first step: coloured when the process has a correlation time, white otherwise.
/// The integrator's clamp is removed again before returning.
pub fn integrate_trajectory<M, I>(
    model: &M,
    integrator: &mut I,
    initial: &StateArray,
    held: &[usize],
    steps: usize,
    dt: f64,
) -> Result<Trajectory>
where
    M: Model + ?Sized,
    I: Integrator,
{
    if initial.nvar() != model.nvar() || initial.modes() != model.number_of_modes() {
        bail!(
            "Initial state shape {:?} does not match the model ({}, 1, {}).",
            initial.shape(),
            model.nvar(),
            model.number_of_modes()
        );
    }
    if !dt.is_finite() || dt <= 0.0 {
        bail!("Step size dt must be positive.");
    }

    if let Some(noise) = integrator.noise_mut() {
        let shape = single_node_shape(initial.nvar(), initial.modes());
        if noise.is_coloured() {
            noise.configure_coloured(dt, shape);
        } else {
            noise.configure_white(dt, shape);
        }
    }

    integrator.set_clamp(Some(Clamp::from_state(initial, held)?));
    let result = run(model, integrator, initial, steps, dt);
    integrator.set_clamp(None);

    let trajectory = result?;
    debug!(
        model = model.name(),
        steps,
        dt,
        held = ?held,
        "integrated phase-plane trajectory"
    );
    Ok(trajectory)
}

fn run<M, I>(
    model: &M,
    integrator: &mut I,
    initial: &StateArray,
    steps: usize,
    dt: f64,
) -> Result<Trajectory>
where
    M: Model + ?Sized,
    I: Integrator,
{
    let coupling = model.zero_coupling();
    let mut times = Vec::with_capacity(steps + 1);
    let mut states = Vec::with_capacity(steps + 1);
    let mut state = initial.clone();
    let mut t = 0.0;

    times.push(t);
    states.push(state.clone());
    for _ in 0..steps {
        integrator.step(model, &mut state, &coupling, &mut t, dt)?;
        times.push(t);
        states.push(state.clone());
    }

    Ok(Trajectory { times, states })
}
