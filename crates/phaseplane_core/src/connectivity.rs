use crate::traits::Model;
use anyhow::{bail, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Default axonal conduction speed in mm/ms.
pub const DEFAULT_CONDUCTION_SPEED: f64 = 3.0;

/// Region-to-region structural connectivity.
#[derive(Debug, Clone, PartialEq)]
pub struct Connectivity {
    pub region_labels: Vec<String>,
    pub weights: DMatrix<f64>,
    /// Tract lengths in mm.
    pub tract_lengths: DMatrix<f64>,
    /// Conduction speed in mm/ms.
    pub speed: f64,
}

impl Connectivity {
    pub fn new(
        region_labels: Vec<String>,
        weights: DMatrix<f64>,
        tract_lengths: DMatrix<f64>,
        speed: f64,
    ) -> Result<Self> {
        let n = region_labels.len();
        if weights.shape() != (n, n) {
            bail!(
                "Weights must be {n}x{n} to match the region labels, got {:?}.",
                weights.shape()
            );
        }
        if tract_lengths.shape() != (n, n) {
            bail!(
                "Tract lengths must be {n}x{n} to match the region labels, got {:?}.",
                tract_lengths.shape()
            );
        }
        if !speed.is_finite() || speed <= 0.0 {
            bail!("Conduction speed must be positive.");
        }
        Ok(Self {
            region_labels,
            weights,
            tract_lengths,
            speed,
        })
    }

    /// Builds from row-major matrices.
    pub fn from_row_major(
        region_labels: Vec<String>,
        weights: &[f64],
        tract_lengths: &[f64],
        speed: f64,
    ) -> Result<Self> {
        let n = region_labels.len();
        if weights.len() != n * n || tract_lengths.len() != n * n {
            bail!("Connectivity matrices must hold {} entries each.", n * n);
        }
        Self::new(
            region_labels,
            DMatrix::from_row_slice(n, n, weights),
            DMatrix::from_row_slice(n, n, tract_lengths),
            speed,
        )
    }

    pub fn number_of_regions(&self) -> usize {
        self.region_labels.len()
    }

    /// Transmission delays in ms.
    pub fn delays(&self) -> DMatrix<f64> {
        &self.tract_lengths / self.speed
    }
}

/// One heatmap panel with region-name tick labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    pub title: String,
    pub colorbar_label: String,
    pub colorbar_label_font_size: f64,
    /// Colorbar length relative to the panel height.
    pub colorbar_shrink: f64,
    pub rows: usize,
    pub cols: usize,
    /// Row-major cell values.
    pub values: Vec<f64>,
    pub x_tick_labels: Vec<String>,
    pub y_tick_labels: Vec<String>,
    pub x_tick_rotation: f64,
    pub tick_font_size: f64,
    pub colormap: String,
    pub interpolation: String,
    pub aspect: String,
}

impl Heatmap {
    fn from_matrix(label: &str, matrix: &DMatrix<f64>, tick_labels: &[String]) -> Self {
        let (rows, cols) = matrix.shape();
        let values = (0..rows)
            .flat_map(|i| (0..cols).map(move |j| matrix[(i, j)]))
            .collect();
        Self {
            title: label.to_string(),
            colorbar_label: label.to_string(),
            colorbar_label_font_size: 14.0,
            colorbar_shrink: 0.2,
            rows,
            cols,
            values,
            x_tick_labels: tick_labels.to_vec(),
            y_tick_labels: tick_labels.to_vec(),
            x_tick_rotation: 90.0,
            tick_font_size: 7.0,
            colormap: "jet".to_string(),
            interpolation: "nearest".to_string(),
            aspect: "equal".to_string(),
        }
    }

    pub fn value(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.cols + col]
    }
}

/// Side-by-side panels under one title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityFigure {
    pub title: String,
    pub title_font_size: f64,
    /// Figure size in inches (width, height).
    pub size: (f64, f64),
    pub panels: Vec<Heatmap>,
}

pub fn connectivity_figure(connectivity: &Connectivity) -> ConnectivityFigure {
    let labels = &connectivity.region_labels;
    ConnectivityFigure {
        title: "TVB SC".to_string(),
        title_font_size: 20.0,
        size: (15.0, 7.0),
        panels: vec![
            Heatmap::from_matrix("Weights", &connectivity.weights, labels),
            Heatmap::from_matrix("Tract lengths", &connectivity.tract_lengths, labels),
        ],
    }
}

/// Zero-filled history of shape `(horizon, nvar, nnodes, nmodes)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBuffer {
    pub shape: [usize; 4],
    pub data: Vec<f64>,
}

impl HistoryBuffer {
    pub fn horizon(&self) -> usize {
        self.shape[0]
    }
}

/// Longest delay in integration steps, plus one.
pub fn history_horizon(connectivity: &Connectivity, dt: f64) -> Result<usize> {
    if !dt.is_finite() || dt <= 0.0 {
        bail!("Step size dt must be positive.");
    }
    let delays = connectivity.delays();
    if delays.iter().any(|delay| !delay.is_finite()) {
        bail!("Delays must be finite.");
    }
    let max_steps = delays
        .iter()
        .map(|delay| (delay / dt).round_ties_even())
        .fold(0.0f64, f64::max);
    if !max_steps.is_finite() || max_steps >= usize::MAX as f64 {
        bail!("Longest delay spans too many steps of size {dt}.");
    }
    match (max_steps as usize).checked_add(1) {
        Some(horizon) => Ok(horizon),
        None => bail!("Longest delay spans too many steps of size {dt}."),
    }
}

pub fn initial_conditions_buffer(
    connectivity: &Connectivity,
    dt: f64,
    nvar: usize,
    nmodes: usize,
) -> Result<HistoryBuffer> {
    let horizon = history_horizon(connectivity, dt)?;
    let shape = [horizon, nvar, connectivity.number_of_regions(), nmodes];
    let Some(len) = shape.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n)) else {
        bail!("History buffer of shape {shape:?} is too large.");
    };
    Ok(HistoryBuffer {
        shape,
        data: vec![0.0; len],
    })
}

/// Buffer sized from a model's variable and mode counts.
pub fn initial_conditions_for_model<M: Model + ?Sized>(
    connectivity: &Connectivity,
    dt: f64,
    model: &M,
) -> Result<HistoryBuffer> {
    initial_conditions_buffer(connectivity, dt, model.nvar(), model.number_of_modes())
}
