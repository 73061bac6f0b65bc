use crate::equation_engine::{compile_expression, Bytecode, VM};
use crate::parameters::{ParameterBinding, ParameterSpec, Parameterized};
use crate::state::StateArray;
use crate::traits::Model;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The generic two-dimensional oscillator neural mass model.
///
/// ```text
/// dV/dt = d * tau * (alpha * W - f * V^3 + e * V^2 + g * V + gamma * I + gamma * c_0)
/// dW/dt = d * (a + b * V + c * V^2 - beta * W) / tau
/// ```
///
/// `c_0` is the long-range coupling arriving on `V`.
#[derive(Debug, Clone, PartialEq)]
pub struct Generic2dOscillator {
    pub tau: f64,
    pub i_ext: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
    pub g: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    modes: usize,
    state_variables: Vec<String>,
    coupling_variables: Vec<usize>,
}

impl Default for Generic2dOscillator {
    fn default() -> Self {
        Self {
            tau: 1.0,
            i_ext: 0.0,
            a: -2.0,
            b: -10.0,
            c: 0.0,
            d: 0.02,
            e: 3.0,
            f: 1.0,
            g: 0.0,
            alpha: 1.0,
            beta: 1.0,
            gamma: 1.0,
            modes: 1,
            state_variables: vec!["V".to_string(), "W".to_string()],
            coupling_variables: vec![0],
        }
    }
}

impl Generic2dOscillator {
    pub fn with_modes(modes: usize) -> Self {
        Self {
            modes: modes.max(1),
            ..Self::default()
        }
    }
}

impl Model for Generic2dOscillator {
    fn name(&self) -> &str {
        "Generic2dOscillator"
    }

    fn state_variables(&self) -> &[String] {
        &self.state_variables
    }

    fn state_variable_range(&self, index: usize) -> (f64, f64) {
        match index {
            0 => (-2.0, 4.0),
            _ => (-6.0, 6.0),
        }
    }

    fn number_of_modes(&self) -> usize {
        self.modes
    }

    fn coupling_variables(&self) -> &[usize] {
        &self.coupling_variables
    }

    fn dfun(&self, state: &StateArray, coupling: &StateArray, out: &mut StateArray) {
        for mode in 0..self.modes {
            let v = state.get(0, mode);
            let w = state.get(1, mode);
            let c_0 = coupling.get(0, mode);

            let dv = self.d
                * self.tau
                * (self.alpha * w - self.f * v * v * v
                    + self.e * v * v
                    + self.g * v
                    + self.gamma * self.i_ext
                    + self.gamma * c_0);
            let dw = self.d * (self.a + self.b * v + self.c * v * v - self.beta * w) / self.tau;

            out.set(0, mode, dv);
            out.set(1, mode, dw);
        }
    }
}

impl Parameterized for Generic2dOscillator {
    fn parameter_bindings(&self) -> Vec<ParameterBinding<Self>> {
        type Setter = fn(&mut Generic2dOscillator, f64);
        let table: [(&str, f64, f64, f64, Setter); 12] = [
            ("tau", self.tau, 1.0, 5.0, |m, v| m.tau = v),
            ("I", self.i_ext, -5.0, 5.0, |m, v| m.i_ext = v),
            ("a", self.a, -5.0, 5.0, |m, v| m.a = v),
            ("b", self.b, -20.0, 15.0, |m, v| m.b = v),
            ("c", self.c, -10.0, 10.0, |m, v| m.c = v),
            ("d", self.d, 0.0001, 1.0, |m, v| m.d = v),
            ("e", self.e, -5.0, 5.0, |m, v| m.e = v),
            ("f", self.f, -5.0, 5.0, |m, v| m.f = v),
            ("g", self.g, -5.0, 5.0, |m, v| m.g = v),
            ("alpha", self.alpha, -5.0, 5.0, |m, v| m.alpha = v),
            ("beta", self.beta, -5.0, 5.0, |m, v| m.beta = v),
            ("gamma", self.gamma, -1.0, 1.0, |m, v| m.gamma = v),
        ];
        table
            .into_iter()
            .map(|(name, value, min, max, setter)| {
                ParameterBinding::new(ParameterSpec::new(name, value, min, max), setter)
            })
            .collect()
    }
}

/// One state variable of an [`EquationModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    /// Right-hand side of `d(name)/dt`.
    pub equation: String,
    pub min: f64,
    pub max: f64,
    /// Whether this variable receives long-range coupling.
    #[serde(default)]
    pub coupled: bool,
}

/// Declarative description of a model given as equation strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquationModelSpec {
    pub name: String,
    pub variables: Vec<VariableSpec>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default = "default_modes")]
    pub modes: usize,
}

fn default_modes() -> usize {
    1
}

/// A model whose derivative is compiled from user-supplied equations.
///
/// Equations may reference state variables, parameters, and the coupling inputs
/// `c_0, c_1, ...` (one per coupled variable, in declaration order).
#[derive(Debug, Clone)]
pub struct EquationModel {
    name: String,
    state_variables: Vec<String>,
    ranges: Vec<(f64, f64)>,
    equations: Vec<Bytecode>,
    parameters: Vec<ParameterSpec>,
    params: Vec<f64>,
    coupling_variables: Vec<usize>,
    modes: usize,
}

impl EquationModel {
    pub fn new(spec: EquationModelSpec) -> Result<Self> {
        if spec.variables.is_empty() {
            bail!("Model must declare at least one state variable.");
        }
        if spec.modes == 0 {
            bail!("Model must have at least one mode.");
        }

        let state_variables: Vec<String> = spec.variables.iter().map(|v| v.name.clone()).collect();
        let param_names: Vec<String> = spec.parameters.iter().map(|p| p.name.clone()).collect();
        let coupling_variables: Vec<usize> = spec
            .variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.coupled)
            .map(|(i, _)| i)
            .collect();

        let mut seen = HashSet::new();
        for name in state_variables.iter().chain(param_names.iter()) {
            if !seen.insert(name.as_str()) {
                bail!("Symbol {name} is declared more than once.");
            }
        }
        for var in &spec.variables {
            if !var.min.is_finite() || !var.max.is_finite() || var.max <= var.min {
                bail!("Range of {} must be finite with max > min.", var.name);
            }
        }

        // Symbols visible to the VM: state variables followed by coupling inputs.
        let mut symbols = state_variables.clone();
        symbols.extend((0..coupling_variables.len()).map(|k| format!("c_{k}")));

        let equations = spec
            .variables
            .iter()
            .map(|var| {
                compile_expression(&var.equation, &symbols, &param_names)
                    .with_context(|| format!("Failed to compile equation for {}", var.name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: spec.name,
            ranges: spec.variables.iter().map(|v| (v.min, v.max)).collect(),
            state_variables,
            equations,
            params: spec.parameters.iter().map(|p| p.value).collect(),
            parameters: spec.parameters,
            coupling_variables,
            modes: spec.modes,
        })
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }
}

impl Model for EquationModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn state_variables(&self) -> &[String] {
        &self.state_variables
    }

    fn state_variable_range(&self, index: usize) -> (f64, f64) {
        self.ranges[index]
    }

    fn number_of_modes(&self) -> usize {
        self.modes
    }

    fn coupling_variables(&self) -> &[usize] {
        &self.coupling_variables
    }

    fn dfun(&self, state: &StateArray, coupling: &StateArray, out: &mut StateArray) {
        let nvar = self.state_variables.len();
        let ncvar = self.coupling_variables.len();
        let mut symbols = vec![0.0; nvar + ncvar];
        let mut stack = Vec::with_capacity(64);

        for mode in 0..self.modes {
            for var in 0..nvar {
                symbols[var] = state.get(var, mode);
            }
            for k in 0..ncvar {
                symbols[nvar + k] = coupling.get(k, mode);
            }
            for (var, eq) in self.equations.iter().enumerate() {
                out.set(var, mode, VM::execute(eq, &symbols, &self.params, &mut stack));
            }
        }
    }
}

impl Parameterized for EquationModel {
    fn parameter_bindings(&self) -> Vec<ParameterBinding<Self>> {
        self.parameters
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let mut spec = spec.clone();
                spec.value = self.params[i];
                ParameterBinding::new(spec, move |m: &mut EquationModel, v| m.params[i] = v)
            })
            .collect()
    }
}
