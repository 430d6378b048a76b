//! Strategy decision core: interval grid, sizing, position lifecycle, the
//! signal gate and the run orchestrator.

pub mod error;
pub mod gate;
pub mod interval;
pub mod orchestrator;
pub mod position;
pub mod sizing;

pub use error::{PositionError, SizingError, StartError, StopError};
pub use gate::SignalGate;
pub use orchestrator::{OrchestratorConfig, StrategyOrchestrator};
pub use position::{PositionManager, RetryPolicy};
pub use sizing::PositionSizer;
