pub mod orchestrator;

pub use orchestrator::{Orchestrator, RunPhase, WorkloadSelection};
