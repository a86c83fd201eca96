use serde::{Deserialize, Serialize};

use crate::{Result, StepflowError, events::EventType};

/// Step-acceptance contract the context consumes from the workflow definition.
pub trait Workflow: Send + Sync {
    /// Names of every step in the workflow.
    fn steps(&self) -> Vec<String>;

    /// Event types accepted by `step`, or `None` when the step does not exist.
    fn accepted_events(
        &self,
        step: &str,
    ) -> Option<Vec<EventType>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepModel {
    pub name: String,
    #[serde(default)]
    pub accepts: Vec<EventType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowModel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub steps: Vec<StepModel>,
}

impl WorkflowModel {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let workflow = serde_json::from_str::<WorkflowModel>(s);
        match workflow {
            Ok(v) => Ok(v),
            Err(e) => Err(StepflowError::Config(format!("{}", e))),
        }
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str::<WorkflowModel>(s)?)
    }

    /// Add a step accepting the given event types.
    pub fn step<I, T>(
        mut self,
        name: &str,
        accepts: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EventType>,
    {
        self.steps.push(StepModel {
            name: name.to_string(),
            accepts: accepts.into_iter().map(Into::into).collect(),
        });
        self
    }
}

impl Workflow for WorkflowModel {
    fn steps(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    fn accepted_events(
        &self,
        step: &str,
    ) -> Option<Vec<EventType>> {
        self.steps.iter().find(|s| s.name == step).map(|s| s.accepts.clone())
    }
}
