pub mod atlas;
pub mod config;
pub mod connectivity;
pub mod equation_engine;
pub mod explorer;
pub mod models;
pub mod noise;
pub mod nullcline;
pub mod parameters;
pub mod solvers;
pub mod state;
pub mod trajectory;
/// The `phaseplane_core` crate computes everything an interactive phase-plane view of a
/// neural mass model needs, independent of any widget or plotting toolkit.
///
/// Key components:
/// - **Traits**: `Model` (state variables, ranges, modes, `dfun`) and `Integrator` (one-step schemes).
/// - **Vector field**: grid sampling of the derivative over a 2-D slice plus its nullclines.
/// - **Trajectory**: a clamped forward integration confined to the plotted slice.
/// - **Explorer**: `recompute(request) -> PhasePlaneFrame`, the pure redraw function behind the UI.
/// - **Helpers**: connectivity heatmaps, initial-condition buffers and atlas region lookup.
pub mod traits;
pub mod vector_field;
