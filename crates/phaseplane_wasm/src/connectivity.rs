//! Connectivity plotting and history-buffer helpers.

use phaseplane_core::connectivity::{self, Connectivity};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

fn build(
    region_labels: Vec<String>,
    weights: &[f64],
    tract_lengths: &[f64],
    speed: f64,
) -> Result<Connectivity, JsValue> {
    Connectivity::from_row_major(region_labels, weights, tract_lengths, speed)
        .map_err(|err| JsValue::from_str(&err.to_string()))
}

/// Heatmap figure spec for row-major weight and tract-length matrices.
#[wasm_bindgen]
pub fn connectivity_figure(
    region_labels: Vec<String>,
    weights: Vec<f64>,
    tract_lengths: Vec<f64>,
    speed: f64,
) -> Result<JsValue, JsValue> {
    let conn = build(region_labels, &weights, &tract_lengths, speed)?;
    to_value(&connectivity::connectivity_figure(&conn))
        .map_err(|err| JsValue::from_str(&format!("Failed to serialize figure: {err}")))
}

/// `[horizon, nvar, nnodes, nmodes]` of the initial-conditions buffer.
#[wasm_bindgen]
pub fn initial_conditions_shape(
    region_labels: Vec<String>,
    tract_lengths: Vec<f64>,
    speed: f64,
    dt: f64,
    nvar: usize,
    nmodes: usize,
) -> Result<Vec<usize>, JsValue> {
    let weights = vec![0.0; tract_lengths.len()];
    let conn = build(region_labels, &weights, &tract_lengths, speed)?;
    let buffer = connectivity::initial_conditions_buffer(&conn, dt, nvar, nmodes)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    Ok(buffer.shape.to_vec())
}

/// The zero-filled initial-conditions buffer, flattened in row-major order.
#[wasm_bindgen]
pub fn initial_conditions_data(
    region_labels: Vec<String>,
    tract_lengths: Vec<f64>,
    speed: f64,
    dt: f64,
    nvar: usize,
    nmodes: usize,
) -> Result<js_sys::Float64Array, JsValue> {
    let weights = vec![0.0; tract_lengths.len()];
    let conn = build(region_labels, &weights, &tract_lengths, speed)?;
    let buffer = connectivity::initial_conditions_buffer(&conn, dt, nvar, nmodes)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    Ok(js_sys::Float64Array::from(buffer.data.as_slice()))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{connectivity_figure, initial_conditions_data, initial_conditions_shape};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn labels() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[wasm_bindgen_test]
    fn initial_conditions_shape_follows_longest_delay() {
        let shape = initial_conditions_shape(labels(), vec![0.0, 6.0, 6.0, 0.0], 3.0, 0.5, 2, 1)
            .expect("valid connectivity");
        assert_eq!(shape, vec![5, 2, 2, 1]);
        let data = initial_conditions_data(labels(), vec![0.0, 6.0, 6.0, 0.0], 3.0, 0.5, 2, 1)
            .expect("valid connectivity");
        assert_eq!(data.length(), 20);
    }

    #[wasm_bindgen_test]
    fn mismatched_connectivity_is_rejected() {
        assert!(initial_conditions_shape(labels(), vec![0.0; 3], 3.0, 0.5, 2, 1).is_err());
        assert!(connectivity_figure(labels(), vec![0.0; 4], vec![0.0; 4], 0.0).is_err());
    }
}
