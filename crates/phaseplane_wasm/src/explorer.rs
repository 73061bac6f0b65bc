//! Phase-plane explorer bindings.

use phaseplane_core::config::{ExplorerConfig, IntegratorName};
use phaseplane_core::explorer::{ControlSurface, PhasePlaneExplorer, PhasePlaneFrame, RedrawRequest};
use phaseplane_core::models::{EquationModel, EquationModelSpec, Generic2dOscillator};
use phaseplane_core::solvers::IntegratorKind;
use phaseplane_core::traits::Model;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

pub(crate) enum ExplorerHandle {
    Oscillator(PhasePlaneExplorer<Generic2dOscillator, IntegratorKind>),
    Equations(PhasePlaneExplorer<EquationModel, IntegratorKind>),
}

impl ExplorerHandle {
    fn model_name(&self) -> &str {
        match self {
            ExplorerHandle::Oscillator(e) => e.model().name(),
            ExplorerHandle::Equations(e) => e.model().name(),
        }
    }

    fn controls(&self) -> ControlSurface {
        match self {
            ExplorerHandle::Oscillator(e) => e.controls(),
            ExplorerHandle::Equations(e) => e.controls(),
        }
    }

    fn recompute(&mut self, request: &RedrawRequest) -> anyhow::Result<PhasePlaneFrame> {
        match self {
            ExplorerHandle::Oscillator(e) => e.recompute(request),
            ExplorerHandle::Equations(e) => e.recompute(request),
        }
    }
}

pub(crate) fn build_config(solver_name: &str, config_toml: Option<&str>) -> Result<ExplorerConfig, String> {
    let mut config = match config_toml {
        Some(contents) => ExplorerConfig::from_toml_str(contents).map_err(|e| e.to_string())?,
        None => ExplorerConfig::default(),
    };
    config.integrator =
        IntegratorName::parse(solver_name).ok_or_else(|| format!("Unknown solver: {solver_name}"))?;
    // No worker pool in the browser.
    config.parallel_sampling = false;
    Ok(config)
}

#[wasm_bindgen]
pub struct WasmExplorer {
    pub(crate) inner: ExplorerHandle,
}

impl WasmExplorer {
    pub(crate) fn with_builtin(
        model_name: &str,
        solver_name: &str,
        config_toml: Option<&str>,
    ) -> Result<WasmExplorer, String> {
        let config = build_config(solver_name, config_toml)?;
        let integrator = IntegratorKind::from_config(&config);
        let inner = match model_name {
            "generic_2d_oscillator" => ExplorerHandle::Oscillator(
                PhasePlaneExplorer::new(Generic2dOscillator::default(), integrator, config)
                    .map_err(|e| e.to_string())?,
            ),
            _ => return Err(format!("Unknown model: {model_name}")),
        };
        Ok(WasmExplorer { inner })
    }

    pub(crate) fn with_equations(
        spec: EquationModelSpec,
        solver_name: &str,
        config_toml: Option<&str>,
    ) -> Result<WasmExplorer, String> {
        let config = build_config(solver_name, config_toml)?;
        let integrator = IntegratorKind::from_config(&config);
        let model = EquationModel::new(spec).map_err(|e| format!("{e:#}"))?;
        let explorer = PhasePlaneExplorer::new(model, integrator, config).map_err(|e| e.to_string())?;
        Ok(WasmExplorer {
            inner: ExplorerHandle::Equations(explorer),
        })
    }

    pub(crate) fn recompute_frame(&mut self, request: &RedrawRequest) -> Result<PhasePlaneFrame, String> {
        self.inner.recompute(request).map_err(|e| e.to_string())
    }
}

#[wasm_bindgen]
impl WasmExplorer {
    /// Explorer over a built-in model (`"generic_2d_oscillator"`).
    #[wasm_bindgen(constructor)]
    pub fn new(
        model_name: &str,
        solver_name: &str,
        config_toml: Option<String>,
    ) -> Result<WasmExplorer, JsValue> {
        console_error_panic_hook::set_once();
        Self::with_builtin(model_name, solver_name, config_toml.as_deref())
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Explorer over a model given as equation strings (an `EquationModelSpec` object).
    pub fn from_equations(
        spec: JsValue,
        solver_name: &str,
        config_toml: Option<String>,
    ) -> Result<WasmExplorer, JsValue> {
        console_error_panic_hook::set_once();
        let spec: EquationModelSpec = from_value(spec)
            .map_err(|err| JsValue::from_str(&format!("Invalid model spec: {err}")))?;
        Self::with_equations(spec, solver_name, config_toml.as_deref()).map_err(|e| JsValue::from_str(&e))
    }

    pub fn model_name(&self) -> String {
        self.inner.model_name().to_string()
    }

    /// Slider and choice descriptors for the UI.
    pub fn controls(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.controls())
            .map_err(|err| JsValue::from_str(&format!("Failed to serialize controls: {err}")))
    }

    /// Recomputes the phase plane for a `RedrawRequest` object and returns the frame.
    pub fn recompute(&mut self, request: JsValue) -> Result<JsValue, JsValue> {
        let request: RedrawRequest = from_value(request)
            .map_err(|err| JsValue::from_str(&format!("Invalid redraw request: {err}")))?;
        let frame = self.recompute_frame(&request).map_err(|e| JsValue::from_str(&e))?;
        to_value(&frame).map_err(|err| JsValue::from_str(&format!("Failed to serialize frame: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::{build_config, ExplorerHandle, WasmExplorer};
    use phaseplane_core::config::IntegratorName;
    use phaseplane_core::explorer::FieldGlyphs;
    use phaseplane_core::models::{EquationModelSpec, VariableSpec};
    use phaseplane_core::parameters::ParameterSpec;

    fn rotation_spec() -> EquationModelSpec {
        EquationModelSpec {
            name: "Rotation".to_string(),
            variables: vec![
                VariableSpec {
                    name: "x".to_string(),
                    equation: "-w * y".to_string(),
                    min: -1.0,
                    max: 1.0,
                    coupled: false,
                },
                VariableSpec {
                    name: "y".to_string(),
                    equation: "w * x".to_string(),
                    min: -1.0,
                    max: 1.0,
                    coupled: false,
                },
            ],
            parameters: vec![ParameterSpec::new("w", 1.0, 0.0, 2.0)],
            modes: 1,
        }
    }

    #[test]
    fn build_config_applies_solver_and_toml() {
        let config = build_config("heun", Some("grid_resolution = 8")).expect("valid config");
        assert_eq!(config.integrator, IntegratorName::Heun);
        assert_eq!(config.grid_resolution, 8);
        assert!(!config.parallel_sampling);

        assert!(build_config("nope", None).is_err());
        assert!(build_config("rk4", Some("grid_resolution = 0")).is_err());
    }

    #[test]
    fn builtin_explorer_recomputes_frames() {
        let mut explorer = WasmExplorer::with_builtin(
            "generic_2d_oscillator",
            "rk4",
            Some("grid_resolution = 10\ntrajectory_steps = 16"),
        )
        .expect("explorer should build");
        assert!(matches!(explorer.inner, ExplorerHandle::Oscillator(_)));

        let request = explorer.inner.controls().initial;
        let frame = explorer.recompute_frame(&request).expect("redraw");
        assert_eq!(frame.x.len(), 10);
        assert_eq!(frame.trajectory.expect("trajectory").times.len(), 17);
    }

    #[test]
    fn unknown_builtin_model_is_rejected() {
        assert!(WasmExplorer::with_builtin("hopfield", "rk4", None).is_err());
    }

    #[test]
    fn equation_explorer_uses_request_parameters() {
        let mut explorer = WasmExplorer::with_equations(rotation_spec(), "euler", Some("grid_resolution = 5"))
            .expect("explorer should build");
        let mut request = explorer.inner.controls().initial;
        request.show_trajectory = false;
        request.parameters.insert("w".to_string(), 0.0);

        let frame = explorer.recompute_frame(&request).expect("redraw");
        assert!(frame.motionless);
        assert!(matches!(frame.glyphs, FieldGlyphs::Scatter { .. }));
    }

    #[test]
    fn invalid_equations_are_reported() {
        let mut spec = rotation_spec();
        spec.variables[0].equation = "-w * ".to_string();
        let err = WasmExplorer::with_equations(spec, "rk4", None).err().expect("parse error");
        assert!(err.contains("x"), "unexpected error: {err}");
    }
}
