use crate::noise::Noise;
use crate::state::{Clamp, StateArray};
use anyhow::Result;

/// A neural mass model as seen by the phase-plane tools.
///
/// The state and derivative tensors have shape `(nvar, 1, modes)`; the coupling tensor
/// has shape `(coupling_variables().len(), 1, modes)`.
pub trait Model: Send + Sync {
    /// Display name used in frame titles.
    fn name(&self) -> &str;

    /// Ordered state-variable names.
    fn state_variables(&self) -> &[String];

    /// Valid (low, high) range of a state variable.
    fn state_variable_range(&self, index: usize) -> (f64, f64);

    /// Number of independent copies of the state carried per node.
    fn number_of_modes(&self) -> usize;

    /// Indices of the state variables that receive long-range coupling.
    fn coupling_variables(&self) -> &[usize];

    /// Evaluates the derivative of `state` into `out`.
    /// Must not depend on anything but its inputs and the current parameter values.
    fn dfun(&self, state: &StateArray, coupling: &StateArray, out: &mut StateArray);

    fn nvar(&self) -> usize {
        self.state_variables().len()
    }

    fn state_variable_index(&self, name: &str) -> Option<usize> {
        self.state_variables().iter().position(|n| n == name)
    }

    /// Midpoint of every state-variable range, in variable order.
    fn state_variable_midpoints(&self) -> Vec<f64> {
        (0..self.nvar())
            .map(|idx| {
                let (lo, hi) = self.state_variable_range(idx);
                0.5 * (lo + hi)
            })
            .collect()
    }

    /// Coupling tensor of zeros, used for single-node analysis.
    fn zero_coupling(&self) -> StateArray {
        StateArray::zeros(self.coupling_variables().len(), self.number_of_modes())
    }
}

/// A one-step integration scheme.
pub trait Integrator {
    /// Advances `state` by one step of size `dt` and moves `t` forward.
    /// Components named by the current clamp are reset to their held values after every stage.
    fn step<M: Model + ?Sized>(
        &mut self,
        model: &M,
        state: &mut StateArray,
        coupling: &StateArray,
        t: &mut f64,
        dt: f64,
    ) -> Result<()>;

    /// Installs (or removes) the set of state variables to hold fixed.
    fn set_clamp(&mut self, clamp: Option<Clamp>);

    /// The noise process of a stochastic scheme.
    fn noise_mut(&mut self) -> Option<&mut Noise> {
        None
    }
}
