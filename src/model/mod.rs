mod workflow;

pub use workflow::{StepModel, Workflow, WorkflowModel};
