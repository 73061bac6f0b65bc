//! The redraw pipeline behind the interactive phase-plane view.
//!
//! A UI binds its widgets to a [`ControlSurface`], turns every change into a
//! [`RedrawRequest`] and draws the [`PhasePlaneFrame`] that
//! [`PhasePlaneExplorer::recompute`] returns. Nothing here knows about widgets or canvases.

use crate::config::ExplorerConfig;
use crate::parameters::{ParameterTable, Parameterized};
use crate::state::StateArray;
use crate::traits::{Integrator, Model};
use crate::trajectory::integrate_trajectory;
use crate::vector_field::{sample_vector_field, Nullclines, PhasePlane, VectorField};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything a redraw depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedrawRequest {
    pub x_var: String,
    pub y_var: String,
    #[serde(default)]
    pub mode: usize,
    #[serde(default)]
    pub show_trajectory: bool,
    /// Parameter values to install before sampling; unnamed parameters take the value the
    /// model had when the explorer was built.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    /// Value of each state variable off the plane (and the trajectory start on it).
    /// Unnamed variables default to the midpoint of their range.
    #[serde(default)]
    pub defaults: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldGlyphs {
    /// Row-major `N x N` derivative components for the selected mode.
    Arrows { u: Vec<f64>, v: Vec<f64> },
    /// Plain grid points, drawn when nothing moves.
    Scatter { points: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryView {
    pub path: Vec<[f64; 2]>,
    pub times: Vec<f64>,
    pub series: Vec<TimeSeries>,
}

/// One fully computed phase-plane figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasePlaneFrame {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: usize,
    pub motionless: bool,
    pub glyphs: FieldGlyphs,
    pub nullclines: Nullclines,
    pub trajectory: Option<TrajectoryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliderControl {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub value: f64,
}

impl SliderControl {
    fn new(name: &str, min: f64, max: f64, value: f64) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            step: (max - min) / 100.0,
            value,
        }
    }
}

/// Widgets an interactive front end should offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSurface {
    pub parameters: Vec<SliderControl>,
    pub state_defaults: Vec<SliderControl>,
    pub x_choices: Vec<String>,
    pub y_choices: Vec<String>,
    pub modes: Vec<usize>,
    pub initial: RedrawRequest,
}

pub struct PhasePlaneExplorer<M, I> {
    model: M,
    integrator: I,
    parameters: ParameterTable<M>,
    config: ExplorerConfig,
}

impl<M, I> PhasePlaneExplorer<M, I>
where
    M: Model + Parameterized,
    I: Integrator,
{
    pub fn new(model: M, integrator: I, config: ExplorerConfig) -> Result<Self> {
        config.validate()?;
        if model.nvar() < 2 {
            bail!("A phase plane needs a model with at least two state variables.");
        }
        if model.number_of_modes() == 0 {
            bail!("Model must have at least one mode.");
        }
        let parameters = ParameterTable::for_model(&model)?;
        Ok(Self {
            model,
            integrator,
            parameters,
            config,
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// First two state variables, mode 0, trajectory on, everything else at its default.
    pub fn initial_request(&self) -> RedrawRequest {
        let names = self.model.state_variables();
        RedrawRequest {
            x_var: names[0].clone(),
            y_var: names[1].clone(),
            mode: 0,
            show_trajectory: true,
            parameters: BTreeMap::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn controls(&self) -> ControlSurface {
        let parameters = self
            .parameters
            .specs()
            .filter(|spec| spec.is_range_bounded())
            .map(|spec| SliderControl::new(&spec.name, spec.min, spec.max, spec.value))
            .collect();

        let midpoints = self.model.state_variable_midpoints();
        let state_defaults = self
            .model
            .state_variables()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let (lo, hi) = self.model.state_variable_range(idx);
                SliderControl::new(name, lo, hi, midpoints[idx])
            })
            .collect();

        let names = self.model.state_variables().to_vec();
        ControlSurface {
            parameters,
            state_defaults,
            x_choices: names.clone(),
            y_choices: names,
            modes: (0..self.model.number_of_modes()).collect(),
            initial: self.initial_request(),
        }
    }

    /// Resets every parameter to its initial value and installs the requested ones, then rebuilds grid, field, nullclines and
    /// (optionally) the trajectory from scratch.
    pub fn recompute(&mut self, request: &RedrawRequest) -> Result<PhasePlaneFrame> {
        self.parameters.apply_over_defaults(&mut self.model, &request.parameters)?;

        let plane = PhasePlane::resolve(&self.model, &request.x_var, &request.y_var)?;
        let modes = self.model.number_of_modes();
        if request.mode >= modes {
            bail!(
                "Mode {} out of range for a model with {} mode(s).",
                request.mode,
                modes
            );
        }
        let defaults = self.defaults_for(request)?;

        let field = sample_grid(
            &self.model,
            plane,
            &defaults,
            self.config.grid_resolution,
            self.config.parallel_sampling,
        )?;
        let motionless = field.is_motionless(request.mode);
        let glyphs = if motionless {
            FieldGlyphs::Scatter {
                points: grid_points(&field),
            }
        } else {
            FieldGlyphs::Arrows {
                u: field.u_for_mode(request.mode),
                v: field.v_for_mode(request.mode),
            }
        };
        let nullclines = field.nullclines(request.mode);

        let trajectory = if request.show_trajectory {
            Some(self.trajectory_view(plane, &defaults, request.mode)?)
        } else {
            None
        };

        let title = if motionless {
            format!("{} mode {}: no motion", self.model.name(), request.mode)
        } else {
            format!("{} mode {}", self.model.name(), request.mode)
        };

        debug!(
            model = self.model.name(),
            x = %request.x_var,
            y = %request.y_var,
            mode = request.mode,
            motionless,
            trajectory = request.show_trajectory,
            "recomputed phase plane"
        );

        Ok(PhasePlaneFrame {
            title,
            x_label: request.x_var.clone(),
            y_label: request.y_var.clone(),
            x: field.x,
            y: field.y,
            mode: request.mode,
            motionless,
            glyphs,
            nullclines,
            trajectory,
        })
    }

    fn defaults_for(&self, request: &RedrawRequest) -> Result<Vec<f64>> {
        let mut defaults = self.model.state_variable_midpoints();
        for (name, &value) in &request.defaults {
            match self.model.state_variable_index(name) {
                Some(idx) => defaults[idx] = value,
                None => bail!("Unknown state variable: {name}"),
            }
        }
        Ok(defaults)
    }

    fn trajectory_view(&mut self, plane: PhasePlane, defaults: &[f64], mode: usize) -> Result<TrajectoryView> {
        let initial = StateArray::broadcast(defaults, self.model.number_of_modes());
        let held = plane.held_indices(self.model.nvar());
        let trajectory = integrate_trajectory(
            &self.model,
            &mut self.integrator,
            &initial,
            &held,
            self.config.trajectory_steps,
            self.config.dt,
        )?;

        let series = self
            .model
            .state_variables()
            .iter()
            .enumerate()
            .map(|(var, name)| TimeSeries {
                name: name.clone(),
                values: trajectory.series(var, mode),
            })
            .collect();

        Ok(TrajectoryView {
            path: trajectory.path(plane.x_index, plane.y_index, mode),
            series,
            times: trajectory.times,
        })
    }
}

fn grid_points(field: &VectorField) -> Vec<[f64; 2]> {
    field
        .y
        .iter()
        .flat_map(|&y| field.x.iter().map(move |&x| [x, y]))
        .collect()
}

#[cfg(feature = "parallel")]
fn sample_grid<M: Model>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    resolution: usize,
    parallel: bool,
) -> Result<VectorField> {
    if parallel {
        crate::vector_field::sample_vector_field_parallel(model, plane, defaults, resolution)
    } else {
        sample_vector_field(model, plane, defaults, resolution)
    }
}

#[cfg(not(feature = "parallel"))]
fn sample_grid<M: Model>(
    model: &M,
    plane: PhasePlane,
    defaults: &[f64],
    resolution: usize,
    _parallel: bool,
) -> Result<VectorField> {
    sample_vector_field(model, plane, defaults, resolution)
}

#[cfg(test)]
mod tests {
    use super::{FieldGlyphs, PhasePlaneExplorer, RedrawRequest};
    use crate::config::ExplorerConfig;
    use crate::models::{EquationModel, EquationModelSpec, Generic2dOscillator, VariableSpec};
    use crate::parameters::ParameterSpec;
    use crate::solvers::{IntegratorKind, RK4};
    use std::collections::BTreeMap;

    fn small_config() -> ExplorerConfig {
        ExplorerConfig {
            grid_resolution: 12,
            trajectory_steps: 64,
            ..ExplorerConfig::default()
        }
    }

    fn variable(name: &str, equation: &str) -> VariableSpec {
        VariableSpec {
            name: name.to_string(),
            equation: equation.to_string(),
            min: -1.0,
            max: 1.0,
            coupled: false,
        }
    }

    fn three_variable_model() -> EquationModel {
        EquationModel::new(EquationModelSpec {
            name: "Lorenzish".to_string(),
            variables: vec![
                variable("x", "k * (y - x)"),
                variable("y", "x * (0.5 - z) - y"),
                variable("z", "x * y - z"),
            ],
            parameters: vec![ParameterSpec::new("k", 1.0, 0.0, 10.0)],
            modes: 2,
        })
        .expect("valid spec")
    }

    #[test]
    fn oscillator_frame_has_arrows_nullclines_and_trajectory() {
        let mut explorer =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");
        let request = explorer.initial_request();
        let frame = explorer.recompute(&request).expect("redraw");

        assert_eq!(frame.title, "Generic2dOscillator mode 0");
        assert_eq!((frame.x_label.as_str(), frame.y_label.as_str()), ("V", "W"));
        assert_eq!(frame.x.len(), 12);
        assert_eq!(frame.x[0], -2.0);
        assert_eq!(frame.y[11], 6.0);
        assert!(!frame.motionless);
        match &frame.glyphs {
            FieldGlyphs::Arrows { u, v } => {
                assert_eq!(u.len(), 144);
                assert_eq!(v.len(), 144);
            }
            other => panic!("expected arrows, got {other:?}"),
        }
        assert!(!frame.nullclines.x.is_empty());
        assert!(!frame.nullclines.y.is_empty());

        let trajectory = frame.trajectory.expect("trajectory requested");
        assert_eq!(trajectory.path.len(), 65);
        assert_eq!(trajectory.times.len(), 65);
        assert_eq!(trajectory.series.len(), 2);
        assert_eq!(trajectory.path[0], [1.0, 0.0]);
    }

    #[test]
    fn parameters_change_the_field() {
        let mut explorer =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");
        let mut request = explorer.initial_request();
        request.show_trajectory = false;
        let before = explorer.recompute(&request).expect("redraw");

        request.parameters.insert("I".to_string(), 2.0);
        let after = explorer.recompute(&request).expect("redraw");
        assert_eq!(explorer.model().i_ext, 2.0);
        assert_ne!(before.glyphs, after.glyphs);
        assert!(after.trajectory.is_none());
    }

    #[test]
    fn frames_do_not_depend_on_earlier_requests() {
        let mut fresh =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");
        let mut replayed =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");
        let request = fresh.initial_request();

        let mut driven = request.clone();
        driven.parameters.insert("I".to_string(), 2.0);
        driven.parameters.insert("a".to_string(), 1.0);
        replayed.recompute(&driven).expect("redraw");

        let expected = fresh.recompute(&request).expect("redraw");
        let actual = replayed.recompute(&request).expect("redraw");
        assert_eq!(actual, expected);
        assert_eq!(replayed.model().i_ext, 0.0);
        assert_eq!(replayed.model().a, -2.0);
    }

    #[test]
    fn motionless_plane_falls_back_to_scatter() {
        let mut explorer =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");
        let mut request = explorer.initial_request();
        request.show_trajectory = false;
        request.parameters.insert("d".to_string(), 0.0);
        let frame = explorer.recompute(&request).expect("redraw");

        assert!(frame.motionless);
        assert_eq!(frame.title, "Generic2dOscillator mode 0: no motion");
        match frame.glyphs {
            FieldGlyphs::Scatter { points } => {
                assert_eq!(points.len(), 144);
                assert_eq!(points[0], [-2.0, -6.0]);
                assert_eq!(points[1][1], -6.0);
            }
            other => panic!("expected scatter, got {other:?}"),
        }
    }

    #[test]
    fn trajectory_holds_off_plane_variables() {
        let mut explorer = PhasePlaneExplorer::new(
            three_variable_model(),
            IntegratorKind::from_config(&ExplorerConfig::default()),
            small_config(),
        )
        .expect("valid explorer");
        let request = RedrawRequest {
            x_var: "x".to_string(),
            y_var: "z".to_string(),
            mode: 1,
            show_trajectory: true,
            parameters: BTreeMap::new(),
            defaults: BTreeMap::from([
                ("x".to_string(), 0.8),
                ("y".to_string(), 0.3),
                ("z".to_string(), -0.4),
            ]),
        };
        let frame = explorer.recompute(&request).expect("redraw");
        let trajectory = frame.trajectory.expect("trajectory requested");

        let y_series = &trajectory.series[1];
        assert_eq!(y_series.name, "y");
        assert!(y_series.values.iter().all(|v| *v == 0.3));
        assert_eq!(trajectory.path[0], [0.8, -0.4]);
        assert_ne!(trajectory.path.last(), Some(&[0.8, -0.4]));
    }

    #[test]
    fn bad_requests_are_rejected() {
        let mut explorer =
            PhasePlaneExplorer::new(Generic2dOscillator::default(), RK4::default(), small_config())
                .expect("valid explorer");

        let mut request = explorer.initial_request();
        request.parameters.insert("not_a_parameter".to_string(), 1.0);
        assert!(explorer.recompute(&request).is_err());

        let mut request = explorer.initial_request();
        request.mode = 1;
        assert!(explorer.recompute(&request).is_err());

        let mut request = explorer.initial_request();
        request.defaults.insert("Q".to_string(), 0.0);
        assert!(explorer.recompute(&request).is_err());

        let mut request = explorer.initial_request();
        request.y_var = "V".to_string();
        assert!(explorer.recompute(&request).is_err());
    }

    #[test]
    fn controls_describe_parameters_and_state_defaults() {
        let explorer = PhasePlaneExplorer::new(three_variable_model(), RK4::default(), small_config())
            .expect("valid explorer");
        let controls = explorer.controls();

        assert_eq!(controls.parameters.len(), 1);
        assert_eq!(controls.parameters[0].name, "k");
        assert_eq!(controls.state_defaults.len(), 3);
        assert_eq!(controls.state_defaults[0].value, 0.0);
        assert_eq!(controls.x_choices, vec!["x", "y", "z"]);
        assert_eq!(controls.modes, vec![0, 1]);
        assert_eq!(controls.initial.x_var, "x");
        assert_eq!(controls.initial.y_var, "y");
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: RedrawRequest =
            serde_json::from_str(r#"{"x_var": "V", "y_var": "W"}"#).expect("valid json");
        assert_eq!(request.mode, 0);
        assert!(!request.show_trajectory);
        assert!(request.parameters.is_empty());
    }
}
