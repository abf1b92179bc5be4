//! Two-mass reduced-order thermal model of a single building zone (VDI 6007 "two elements").

pub mod error;
pub mod model;
pub mod ports;
pub mod rc_network;
pub mod reduced;
pub mod scenario;
pub mod signals;
pub mod simulation;
pub mod solver;
pub mod tools;
pub mod validation;

pub use error::Error;
pub use model::{BuildingParameters, ParameterTable};
pub use ports::{AirControl, PortConfiguration};
pub use signals::{BoundarySignals, StepInputs};
pub use simulation::{simulate, OutputSeries, Simulator, StepResult, ThermalState};
pub use solver::{LinearSolver, LuSolver};
