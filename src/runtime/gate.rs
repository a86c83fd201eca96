use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

use crate::common::Signal;

/// Coordination primitives for stepwise execution.
///
/// The context exposes these for an external stepwise scheduler and never
/// drives them itself.
#[derive(Debug, Default)]
pub struct StepGate {
    advance: Notify,
    event_written: Notify,
    flags: Mutex<HashMap<String, Arc<Signal>>>,
}

impl StepGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-step flag, created on first access.
    pub fn step_flag(
        &self,
        step: &str,
    ) -> Arc<Signal> {
        self.flags.lock().unwrap().entry(step.to_string()).or_default().clone()
    }

    /// Wake every task waiting in [`StepGate::advanced`].
    pub fn advance(&self) {
        self.advance.notify_waiters();
    }

    pub async fn advanced(&self) {
        self.advance.notified().await;
    }

    /// Wake every task waiting in [`StepGate::event_written`].
    pub fn notify_event_written(&self) {
        self.event_written.notify_waiters();
    }

    pub async fn event_written(&self) {
        self.event_written.notified().await;
    }
}
