pub mod agent;
pub mod error;
pub mod limit;
pub mod registry;
pub mod runner;
pub mod tools;

pub use agent::AgentDefinition;
pub use error::EngineError;
pub use registry::{RegistryError, ToolRegistry};
pub use runner::{ChatRunner, LoopEvent, RunnerConfig};
