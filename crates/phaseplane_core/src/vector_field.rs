use crate::nullcline::{zero_contour, Segment};
use crate::state::StateArray;
use crate::traits::Model;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_GRID_RESOLUTION: usize = 42;

/// `n` evenly spaced samples from `lo` to `hi`, both endpoints included exactly.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            let mut axis: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
            axis[n - 1] = hi;
            axis
        }
    }
}

/// The two state variables spanning a phase plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasePlane {
    pub x_index: usize,
    pub y_index: usize,
}

impl PhasePlane {
    pub fn resolve<M: Model + ?Sized>(model: &M, x_var: &str, y_var: &str) -> Result<Self> {
        let Some(x_index) = model.state_variable_index(x_var) else {
            bail!("Unknown state variable: {x_var}");
        };
        let Some(y_index) = model.state_variable_index(y_var) else {
            bail!("Unknown state variable: {y_var}");
        };
        if x_index == y_index {
            bail!("The x and y axes must use different state variables.");
        }
        Ok(Self { x_index, y_index })
    }

    /// Every state variable not spanned by the plane.
    pub fn held_indices(&self, nvar: usize) -> Vec<usize> {
        (0..nvar)
            .filter(|&i| i != self.x_index && i != self.y_index)
            .collect()
    }
}

/// Derivatives of the plotted variables over the grid, for every mode.
///
/// `u(i, j, k)` and `v(i, j, k)` are evaluated at `x = x[j]`, `y = y[i]`:
/// rows follow Y and columns follow X.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub plane: PhasePlane,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    modes: usize,
    u: Vec<f64>,
    v: Vec<f64>,
}

/// Zero-derivative curves of the plotted variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nullclines {
    pub x: Vec<Segment>,
    pub y: Vec<Segment>,
}

impl VectorField {
    pub fn resolution(&self) -> usize {
        self.x.len()
    }

    pub fn modes(&self) -> usize {
        self.modes
    }

    #[inline]
    fn offset(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.x.len() + j) * self.modes + k
    }

    pub fn u(&self, i: usize, j: usize, k: usize) -> f64 {
        self.u[self.offset(i, j, k)]
    }

    pub fn v(&self, i: usize, j: usize, k: usize) -> f64 {
        self.v[self.offset(i, j, k)]
    }

    /// Row-major `N x N` slice of U for one mode.
    pub fn u_for_mode(&self, mode: usize) -> Vec<f64> {
        self.u.iter().skip(mode).step_by(self.modes).copied().collect()
    }

    pub fn v_for_mode(&self, mode: usize) -> Vec<f64> {
        self.v.iter().skip(mode).step_by(self.modes).copied().collect()
    }

    /// True when nothing moves anywhere on the grid for `mode`.
    pub fn is_motionless(&self, mode: usize) -> bool {
        self.u
            .iter()
            .zip(&self.v)
            .skip(mode)
            .step_by(self.modes)
            .all(|(u, v)| *u == 0.0 && *v == 0.0)
    }

    pub fn nullclines(&self, mode: usize) -> Nullclines {
        Nullclines {
            x: zero_contour(&self.x, &self.y, |i, j| self.u(i, j, mode)),
            y: zero_contour(&self.x, &self.y, |i, j| self.v(i, j, mode)),
        }
    }
}

fn check_inputs<M: Model + ?Sized>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    resolution: usize,
) -> Result<()> {
    let nvar = model.nvar();
    if defaults.len() != nvar {
        bail!(
            "Expected {} default values, got {}.",
            nvar,
            defaults.len()
        );
    }
    if plane.x_index >= nvar || plane.y_index >= nvar {
        bail!("Phase plane variable index out of range.");
    }
    if plane.x_index == plane.y_index {
        bail!("The x and y axes must use different state variables.");
    }
    if resolution < 2 {
        bail!("Grid resolution must be at least 2.");
    }
    if model.number_of_modes() == 0 {
        bail!("Model must have at least one mode.");
    }
    for idx in [plane.x_index, plane.y_index] {
        let (lo, hi) = model.state_variable_range(idx);
        if !lo.is_finite() || !hi.is_finite() || hi <= lo {
            bail!(
                "Range of {} must be finite with max > min.",
                model.state_variables()[idx]
            );
        }
    }
    Ok(())
}

fn axes<M: Model + ?Sized>(model: &M, plane: PhasePlane, resolution: usize) -> (Vec<f64>, Vec<f64>) {
    let (x_lo, x_hi) = model.state_variable_range(plane.x_index);
    let (y_lo, y_hi) = model.state_variable_range(plane.y_index);
    (
        linspace(x_lo, x_hi, resolution),
        linspace(y_lo, y_hi, resolution),
    )
}

/// Evaluates one grid row (fixed `y`), returning the U and V entries for every column and mode.
fn sample_row<M: Model + ?Sized>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    x: &[f64],
    y: f64,
) -> (Vec<f64>, Vec<f64>) {
    let modes = model.number_of_modes();
    let coupling = model.zero_coupling();
    let mut state = StateArray::broadcast(defaults, modes);
    let mut deriv = StateArray::zeros(model.nvar(), modes);
    let mut u = Vec::with_capacity(x.len() * modes);
    let mut v = Vec::with_capacity(x.len() * modes);

    state.variable_mut(plane.y_index).fill(y);
    for &xj in x {
        state.variable_mut(plane.x_index).fill(xj);
        model.dfun(&state, &coupling, &mut deriv);
        u.extend_from_slice(deriv.variable(plane.x_index));
        v.extend_from_slice(deriv.variable(plane.y_index));
    }
    (u, v)
}

/// Samples the derivative of the plotted variables on a `resolution x resolution` grid
/// spanning their valid ranges. Other variables sit at `defaults`; coupling is zero.
pub fn sample_vector_field<M: Model + ?Sized>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    resolution: usize,
) -> Result<VectorField> {
    check_inputs(model, plane, defaults, resolution)?;
    let (x, y) = axes(model, plane, resolution);
    let modes = model.number_of_modes();

    let mut u = Vec::with_capacity(resolution * resolution * modes);
    let mut v = Vec::with_capacity(resolution * resolution * modes);
    for &yi in &y {
        let (row_u, row_v) = sample_row(model, plane, defaults, &x, yi);
        u.extend(row_u);
        v.extend(row_v);
    }

    Ok(VectorField {
        plane,
        x,
        y,
        modes,
        u,
        v,
    })
}

/// Same as [`sample_vector_field`], with grid rows evaluated on the rayon pool.
#[cfg(feature = "parallel")]
pub fn sample_vector_field_parallel<M: Model + ?Sized>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    resolution: usize,
) -> Result<VectorField> {
    use rayon::prelude::*;

    check_inputs(model, plane, defaults, resolution)?;
    let (x, y) = axes(model, plane, resolution);
    let modes = model.number_of_modes();

    let rows: Vec<(Vec<f64>, Vec<f64>)> = y
        .par_iter()
        .map(|&yi| sample_row(model, plane, defaults, &x, yi))
        .collect();

    let mut u = Vec::with_capacity(resolution * resolution * modes);
    let mut v = Vec::with_capacity(resolution * resolution * modes);
    for (row_u, row_v) in rows {
        u.extend(row_u);
        v.extend(row_v);
    }

    Ok(VectorField {
        plane,
        x,
        y,
        modes,
        u,
        v,
    })
}
