//! WASM bridge for the phaseplane core library.
//!
//! The browser front end owns the widgets and the canvas; everything it draws comes
//! from the serializable frames and figure specs produced here.

mod connectivity;
mod explorer;

pub use connectivity::{connectivity_figure, initial_conditions_data, initial_conditions_shape};
pub use explorer::WasmExplorer;
