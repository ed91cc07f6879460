//! Task & Agent model (C3) and the Sequential/Hierarchical process
//! scheduler (C4).

pub mod agent;
pub mod crew;
pub mod error;
pub mod task;

pub use agent::{
    Agent, AgentExecutionConfig, AgentStats, ExecutionMode, ReActStep, StaticToolExecutor,
    ToolExecutor,
};
pub use crew::{Crew, CrewConfig, CrewOutput, Process, TaskCallback};
pub use error::{EngineError, Result};
pub use task::{Task, TaskOutput};
