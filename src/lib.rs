//! LayerPaint: layered raster painting core.
//!
//! The library holds everything that has state: surfaces and the layer
//! store, the compositor, snapshot history, the tool state machine and the
//! [`project::Session`] that ties them together. The binary adds the egui
//! front end and the headless script runner on top.

#![allow(clippy::too_many_arguments)]

#[macro_use]
pub mod logger;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod compositor;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{Layer, LayerStore, Surface};
pub use components::history::{HistoryManager, RestoreStatus, Snapshot};
pub use components::tools::{Tool, ToolsPanel};
pub use compositor::Compositor;
pub use project::{Session, SessionConfig, TextRequest};
