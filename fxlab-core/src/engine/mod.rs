//! Backtesting engine: iterative bar-by-bar replay with explicit accounting.

pub mod simulator;

pub use simulator::{
    simulate, IterativeSimulator, SimulationConfig, SimulationError, SimulationReport, Transition,
};
