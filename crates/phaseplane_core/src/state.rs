use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// State tensor of a single node, laid out as `(nvar, 1, modes)`.
///
/// Values are stored variable-major: the `modes` entries of variable 0 come first,
/// then those of variable 1, and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateArray {
    nvar: usize,
    modes: usize,
    data: Vec<f64>,
}

impl StateArray {
    pub fn zeros(nvar: usize, modes: usize) -> Self {
        Self {
            nvar,
            modes,
            data: vec![0.0; nvar * modes],
        }
    }

    /// Builds a state from one scalar per variable, repeated across every mode.
    pub fn broadcast(values: &[f64], modes: usize) -> Self {
        let mut data = Vec::with_capacity(values.len() * modes);
        for &value in values {
            data.extend(std::iter::repeat(value).take(modes));
        }
        Self {
            nvar: values.len(),
            modes,
            data,
        }
    }

    pub fn from_vec(nvar: usize, modes: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != nvar * modes {
            bail!(
                "State data length ({}) does not match shape ({}, 1, {}).",
                data.len(),
                nvar,
                modes
            );
        }
        Ok(Self { nvar, modes, data })
    }

    pub fn nvar(&self) -> usize {
        self.nvar
    }

    pub fn modes(&self) -> usize {
        self.modes
    }

    pub fn shape(&self) -> [usize; 3] {
        [self.nvar, 1, self.modes]
    }

    #[inline]
    pub fn get(&self, var: usize, mode: usize) -> f64 {
        self.data[var * self.modes + mode]
    }

    #[inline]
    pub fn set(&mut self, var: usize, mode: usize, value: f64) {
        self.data[var * self.modes + mode] = value;
    }

    /// All modes of one state variable.
    pub fn variable(&self, var: usize) -> &[f64] {
        &self.data[var * self.modes..(var + 1) * self.modes]
    }

    pub fn variable_mut(&mut self, var: usize) -> &mut [f64] {
        &mut self.data[var * self.modes..(var + 1) * self.modes]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Reallocates as zeros when the shape differs from `other`; used for solver scratch space.
    pub fn reshape_like(&mut self, other: &StateArray) {
        if self.nvar != other.nvar || self.modes != other.modes {
            *self = StateArray::zeros(other.nvar, other.modes);
        }
    }

    pub fn copy_from(&mut self, other: &StateArray) {
        self.reshape_like(other);
        self.data.copy_from_slice(&other.data);
    }
}

/// State variables an integrator must hold fixed, with the value held per mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Clamp {
    indices: Vec<usize>,
    values: Vec<f64>,
    modes: usize,
}

impl Clamp {
    /// Pins `indices` to the values they have in `state`.
    pub fn from_state(state: &StateArray, indices: &[usize]) -> Result<Self> {
        let mut values = Vec::with_capacity(indices.len() * state.modes());
        for &idx in indices {
            if idx >= state.nvar() {
                bail!("Clamped variable index {} out of range.", idx);
            }
            values.extend_from_slice(state.variable(idx));
        }
        Ok(Self {
            indices: indices.to_vec(),
            values,
            modes: state.modes(),
        })
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn apply(&self, state: &mut StateArray) {
        for (slot, &idx) in self.indices.iter().enumerate() {
            let held = &self.values[slot * self.modes..(slot + 1) * self.modes];
            state.variable_mut(idx).copy_from_slice(held);
        }
    }
}
